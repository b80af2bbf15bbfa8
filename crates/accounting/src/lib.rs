#![doc = include_str!("../README.md")]

pub mod address;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod logger;
pub mod purge;
pub mod session;
pub mod stats;
pub mod table;

pub use address::{Address, AddressKind, same, subnet_contains, to_text};
pub use classifier::{Classification, IpPair, SkipReason, classify};
pub use engine::{AccountOutcome, AccountingEngine, Direction, PacketOutcome, TargetList};
pub use error::AccountingError;
pub use logger::{FileHostLogger, HostSink, LogRecord, parse_record};
pub use purge::{PurgeManager, PurgePolicy, PurgeReport, PurgeSchedule};
pub use session::{
    AccountingSession, AccountingSessionBuilder, CycleOutcome, SessionConfig, SessionSummary,
};
pub use stats::SessionStats;
pub use table::{Host, HostTable};
