mod info;
mod search;
mod socket;

pub(crate) use self::info::{info, test};
pub(crate) use self::search::search;
pub(crate) use self::socket::socket;
