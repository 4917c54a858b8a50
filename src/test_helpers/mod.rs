// Test Helpers Module - Orchestrator Testing Infrastructure
//
// Scriptable stand-ins for the executor plus fault-injecting and recording
// wrappers around the store and bus SPIs. Used by the unit tests and by the
// integration suites under tests/.

pub mod fault_injecting_store;
pub mod recording_bus;
pub mod scripted_executor;

pub use fault_injecting_store::{FaultInjectingStore, StoreFault};
pub use recording_bus::{BusCall, RecordingBus};
pub use scripted_executor::{ScriptStep, ScriptedExecutor};
