mod feed;
mod live;
mod polling;

pub use feed::{channel_name, ChangeEvent, ChangeFeed, ChangeKind, FeedRegistry, Subscription};
pub use live::LiveView;
pub use polling::{diff_snapshots, PollingFeed};
