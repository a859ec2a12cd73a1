//! Fetch comments (and optionally their replies) from TikTok and YouTube
//! videos, flatten them into [`record::CommentRecord`]s and checkpoint them to
//! a JSON file while the run is in progress.

pub mod prelude;
pub mod record;
pub mod scrape {
    pub mod scraper {
        pub mod tiktok;
        pub mod youtube;
    }
    pub mod connector;
    pub mod fetch_loop;
    pub mod normalize;
    pub mod pacing;
    pub mod retry;
    pub mod util;
}
pub mod service {
    pub mod browser_service;
    pub mod checkpoint_service;
    pub mod var_service;
}
pub mod util {
    pub mod log_service;
    pub mod path_service;
    pub mod signal_service;
}
