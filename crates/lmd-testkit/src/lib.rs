//! Shared fixtures and fakes for exercising the engine's subsystems without
//! a live Postgres, a live HTTP fetcher, or a live webhook subscriber:
//! an in-memory [`Store`](lmd_store::Store), a scripted
//! [`Fetcher`](lmd_schemas::Fetcher), and a recording
//! [`SubscriberSink`](lmd_dispatcher::sink::SubscriberSink). Integration
//! tests in `lmd-scheduler`, `lmd-dispatcher`, `lmd-daemon`, and `lmd-cli`
//! build on these instead of each re-deriving their own.

pub mod fake_fetcher;
pub mod fixtures;
pub mod memory_store;
pub mod recording_sink;

pub use fake_fetcher::{FailingFetcher, ScriptedFetcher};
pub use memory_store::MemoryStore;
pub use recording_sink::{RecordedDelivery, RecordingSink};
