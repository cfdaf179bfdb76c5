//! Shared fixtures: payload builders and a scripted trace backend

#![allow(dead_code)]

use clrtree::domain::{Pid, ProbeError, TraceError};
use clrtree::events::EventRecord;
use clrtree::probe::{LoadedModule, ModuleSource};
use clrtree::session::{PumpControl, PumpExit, RecordSink, SessionHandle, SessionStart, TraceBackend};
use clrtree_common::{
    Guid, APP_DOMAIN_DC_START_V1, ASSEMBLY_DC_START_V1, CLR_METHOD_DC_START_COMPLETE_OPCODE,
    CLR_MODULE_DC_START_OPCODE, CLR_RUNDOWN_PROVIDER, CLR_RUNTIME_PROVIDER, DC_START_COMPLETE_V1,
    MODULE_DC_START_V1, RUNTIME_INFORMATION_DC_START,
};

pub const TARGET_PID: u32 = 4321;

/// Little-endian packed payload writer
#[derive(Default)]
pub struct PayloadBuilder {
    buf: Vec<u8>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn wstr(mut self, s: &str) -> Self {
        self.buf.extend(s.encode_utf16().chain(std::iter::once(0)).flat_map(u16::to_le_bytes));
        self
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// One record the scripted backend will deliver
#[derive(Debug, Clone)]
pub struct ScriptedRecord {
    pub provider: Guid,
    pub process_id: u32,
    pub id: u16,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl ScriptedRecord {
    pub fn from_pid(mut self, pid: u32) -> Self {
        self.process_id = pid;
        self
    }
}

fn id_record(id: u16, payload: Vec<u8>) -> ScriptedRecord {
    ScriptedRecord { provider: CLR_RUNTIME_PROVIDER, process_id: TARGET_PID, id, opcode: 0, payload }
}

fn legacy_record(opcode: u8, payload: Vec<u8>) -> ScriptedRecord {
    ScriptedRecord { provider: CLR_RUNDOWN_PROVIDER, process_id: TARGET_PID, id: 0, opcode, payload }
}

pub fn runtime_start(instance: u16, vm: [u16; 4], flags: u32, mode: u8, cmd: &str) -> ScriptedRecord {
    let payload = PayloadBuilder::new()
        .u16(instance)
        .u16(1) // sku
        .u16(vm[0])
        .u16(vm[1])
        .u16(vm[2])
        .u16(vm[3])
        .u16(vm[0])
        .u16(vm[1])
        .u16(vm[2])
        .u16(vm[3])
        .u32(flags)
        .u8(mode)
        .wstr(cmd)
        .bytes(&[0; 16])
        .wstr("C:\\Windows\\Microsoft.NET\\Framework\\v4.0.30319\\clr.dll")
        .build();
    id_record(RUNTIME_INFORMATION_DC_START, payload)
}

/// Runtime-start that ends right after the startup mode
pub fn runtime_start_short(instance: u16, vm: [u16; 4]) -> ScriptedRecord {
    let mut builder = PayloadBuilder::new().u16(instance).u16(1);
    for _ in 0..2 {
        builder = vm.iter().fold(builder, |builder, &part| builder.u16(part));
    }
    id_record(RUNTIME_INFORMATION_DC_START, builder.u32(0).u8(0x1).build())
}

pub fn domain_start(instance: u16, domain: u64, flags: u32, name: &str) -> ScriptedRecord {
    let payload =
        PayloadBuilder::new().u64(domain).u32(flags).wstr(name).u32(1).u16(instance).build();
    id_record(APP_DOMAIN_DC_START_V1, payload)
}

pub fn assembly_start(instance: u16, domain: u64, assembly: u64, flags: u32, name: &str) -> ScriptedRecord {
    let payload = PayloadBuilder::new()
        .u64(assembly)
        .u64(domain)
        .u64(0)
        .u32(flags)
        .wstr(name)
        .u16(instance)
        .build();
    id_record(ASSEMBLY_DC_START_V1, payload)
}

pub fn module_start(instance: u16, module: u64, assembly: u64, il: &str, native: &str) -> ScriptedRecord {
    let payload = PayloadBuilder::new()
        .u64(module)
        .u64(assembly)
        .u32(0x8)
        .u32(0)
        .wstr(il)
        .wstr(native)
        .u16(instance)
        .build();
    id_record(MODULE_DC_START_V1, payload)
}

pub fn rundown_complete() -> ScriptedRecord {
    id_record(DC_START_COMPLETE_V1, PayloadBuilder::new().u16(1).build())
}

pub fn legacy_module(module: u64, flags: u32, il: &str, native: &str) -> ScriptedRecord {
    let payload = PayloadBuilder::new()
        .u64(module)
        .u64(module + 0x100)
        .u32(flags)
        .u32(0)
        .wstr(il)
        .wstr(native)
        .build();
    legacy_record(CLR_MODULE_DC_START_OPCODE, payload)
}

pub fn legacy_complete() -> ScriptedRecord {
    legacy_record(CLR_METHOD_DC_START_COMPLETE_OPCODE, Vec::new())
}

/// Trace backend that plays back one scripted stream per session, in order
#[derive(Default)]
pub struct ScriptedBackend {
    pub streams: Vec<Vec<ScriptedRecord>>,
    pub start_error: Option<TraceError>,
    pub enabled: Vec<Guid>,
    pub delivered: usize,
    pub stopped: usize,
}

impl ScriptedBackend {
    pub fn new(streams: Vec<Vec<ScriptedRecord>>) -> Self {
        Self { streams, ..Self::default() }
    }
}

impl TraceBackend for ScriptedBackend {
    fn is_available(&self) -> bool {
        true
    }

    fn start_session(&mut self, _name: &str) -> Result<SessionStart, TraceError> {
        match &self.start_error {
            Some(e) => Err(e.clone()),
            None => Ok(SessionStart::Started(SessionHandle(1))),
        }
    }

    fn query_session(&mut self, _name: &str) -> Result<SessionHandle, TraceError> {
        Ok(SessionHandle(1))
    }

    fn enable_provider(
        &mut self,
        _session: SessionHandle,
        provider: &Guid,
        _level: u8,
        _keywords: u64,
    ) -> Result<(), TraceError> {
        self.enabled.push(*provider);
        Ok(())
    }

    fn process(&mut self, _name: &str, sink: &mut RecordSink<'_>) -> Result<PumpExit, TraceError> {
        if self.streams.is_empty() {
            return Ok(PumpExit::Exhausted);
        }
        let stream = self.streams.remove(0);
        for scripted in &stream {
            let record = EventRecord {
                provider: scripted.provider,
                process_id: scripted.process_id,
                id: scripted.id,
                opcode: scripted.opcode,
                payload: &scripted.payload,
            };
            self.delivered += 1;
            if sink(&record) == PumpControl::Stop {
                return Ok(PumpExit::Stopped);
            }
        }
        Ok(PumpExit::Exhausted)
    }

    fn stop_session(&mut self, _session: SessionHandle, _name: &str) -> Result<(), TraceError> {
        self.stopped += 1;
        Ok(())
    }
}

/// Module source returning a fixed list
pub struct FixedModules(pub Vec<LoadedModule>);

impl FixedModules {
    /// Runtime DLLs for the given framework folders, e.g. `"v4.0.30319"`
    pub fn frameworks(folders: &[(&str, &str)]) -> Self {
        Self(
            folders
                .iter()
                .map(|(folder, dll)| {
                    LoadedModule::from_path(format!(
                        "C:\\Windows\\Microsoft.NET\\Framework\\{folder}\\{dll}"
                    ))
                })
                .collect(),
        )
    }
}

impl ModuleSource for FixedModules {
    fn modules(&self, _pid: Pid) -> Result<Vec<LoadedModule>, ProbeError> {
        Ok(self.0.clone())
    }
}
