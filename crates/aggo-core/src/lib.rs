#[macro_use]
mod log_macros;

pub mod error;
pub mod event;
mod flush;
pub mod matcher;
pub mod rule;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod table;
mod window;

pub use event::Event;
pub use flush::{FlushOutcome, WindowClosed};
pub use matcher::{ExactMatcher, GlobMatcher, Matcher, RegexMatcher};
pub use rule::{Rule, RuleBucket};
pub use sink::{FlushedWindow, Sink};
pub use source::SourceRecord;
pub use table::RuleTable;
