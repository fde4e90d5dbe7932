use super::MediaItem;

/// Number of catalog entries returned when nothing matches the query.
pub const FALLBACK_LIMIT: usize = 5;

// (id, title, duration)
const CATALOG: &[(&str, &str, &str)] = &[
  (
    "swC9xzv1kXE",
    "Main Agar Saamne Aa Bhi Jaaya Karo | Raaz | Dino, Bipasha Basu | Abhijeet, Alka Yagnik",
    "5:40",
  ),
  (
    "hoNb6HuNmU0",
    "Kya Mujhe Pyar Hai Full Video - Woh Lamhe|Shiny Ahuja,Kangna Ranaut|KK|Pritam",
    "5:08",
  ),
  (
    "hejXc_FSYb8",
    "Rozana - Naam Shabana | Akshay Kumar, Taapsee Pannu | Shreya Ghoshal |Rochak Kohli |Manoj Muntashir",
    "3:42",
  ),
  ("JGwWNGJdvx8", "Ed Sheeran - Shape of You (Official Music Video)", "4:24"),
  ("kJQP7kiw5Fk", "Luis Fonsi - Despacito ft. Daddy Yankee", "4:41"),
  ("xpVfcZ0ZcFM", "Drake - God's Plan", "5:57"),
  ("2Vv-BfVoq4g", "Billie Eilish - bad guy", "3:25"),
  ("fHI8X4OXluQ", "The Weeknd - Blinding Lights (Official Video)", "4:22"),
];

fn item(&(id, title, duration): &(&str, &str, &str)) -> MediaItem {
  MediaItem {
    id: id.to_owned(),
    title: title.to_owned(),
    thumbnail: format!("https://img.youtube.com/vi/{id}/maxresdefault.jpg"),
    duration: duration.to_owned(),
  }
}

/// Catalog entries whose title contains `query` (case-insensitive), or the
/// first few entries when none does.
pub fn fallback(query: &str) -> Vec<MediaItem> {
  let query = query.to_lowercase();
  let matches: Vec<MediaItem> = CATALOG
    .iter()
    .filter(|(_, title, _)| title.to_lowercase().contains(&query))
    .map(item)
    .collect();

  if matches.is_empty() {
    CATALOG.iter().take(FALLBACK_LIMIT).map(item).collect()
  } else {
    matches
  }
}
