//! # clrtree - .NET Runtime Structure Inspector
//!
//! clrtree shows which CLR instances, AppDomains and assemblies a running
//! process has loaded. It asks the runtime itself: a real-time ETW session
//! enables the CLR rundown keywords, the runtime enumerates everything it
//! has loaded as "start" events, and those events are correlated into a
//! tree.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Target Process                            │
//! │          (CLR 1.x / 2.0 / 4+ instances, AppDomains)             │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ rundown events (ETW)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    clrtree (This Crate)                         │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Probe     │──▶│   Session    │──▶│  Processor   │         │
//! │  │ (versions)   │   │ (ETW pump)   │   │ (filter)     │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                               │                 │
//! │                     ┌──────────────┐   ┌──────▼───────┐         │
//! │                     │   Builder    │◀──│   Decoder    │         │
//! │                     │ (correlate)  │   │ (payloads)   │         │
//! │                     └──────┬───────┘   └──────────────┘         │
//! │                            ▼                                    │
//! │                     ┌──────────────┐   ┌──────────────┐         │
//! │                     │  Node Store  │──▶│    Export    │         │
//! │                     │   (arena)    │   │ (text, json) │         │
//! │                     └──────────────┘   └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`probe`]: find `clr.dll` / `mscorwks.dll` / `mscorsvr.dll` among the
//!   loaded modules and read the CLR version from their folder
//! - [`session`]: start, reuse and stop the `PhDnLogger` session and pump
//!   its records
//!   - `etw`: native backend (Windows only)
//! - [`events`]: bounds-checked decoding of rundown payloads for both wire
//!   protocols (CLR 2.0 opcodes, CLR 4+ event IDs)
//! - [`tree`]: arena node store, tree builder, presenter query surface
//! - [`processor`]: per-record filter, decode and build step with counters
//! - [`inspect`]: the whole walk for one process
//! - [`export`]: text table and JSON snapshot
//! - [`flags`]: bitmask to label tables
//! - [`cli`], [`domain`]: arguments, identifier newtypes and error types
//!
//! ## Protocol Generations
//!
//! | Runtime | Provider                                | Records told apart by |
//! |---------|-----------------------------------------|-----------------------|
//! | 2.0     | `a669021c-c450-4609-a035-5af59af4df18`  | opcode (event ID 0)   |
//! | 4+      | `e13c0d23-ccbc-4e12-931b-d9cc2eee27e4`  | event ID              |
//!
//! CLR 2.0 only reports modules, so its tree is flat: modules hang directly
//! off a placeholder `CLR v2.0.50727` root. CLR 1.x emits no rundown at all
//! and only gets a placeholder root.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Print the runtime tree (elevated prompt)
//! clrtree --pid <PID>
//!
//! # JSON snapshot
//! clrtree --pid <PID> --format json
//! ```

pub mod cli;
pub mod domain;
pub mod events;
pub mod export;
pub mod flags;
pub mod inspect;
pub mod probe;
pub mod processor;
pub mod session;
pub mod tree;
