// SPDX-License-Identifier: MIT
//! Pure data: the typed sum-of-variants tree produced by the grammar engine.
//! No behaviour beyond small accessors and the enum mappings below.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub declarations: Vec<DeclarationCommand>,
    pub simulations: Vec<SimulationCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DeclarationCommand {
    Comment { text: String },
    Date { text: String },
    Version { text: String },
    AttrBegin { text: String },
    AttrEnd { text: String },
    EndDefinitions,
    Scope { scope_kind: ScopeKind, id: String },
    Upscope,
    Timescale { number: i64, unit: TimeUnit },
    Var {
        var_type: VarKind,
        size: i32,
        code: String,
        id: IdT,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    S,
    Ms,
    Us,
    Ns,
    Ps,
    Fs,
}

impl TimeUnit {
    /// Seconds-per-tick multiplier for one unit of this scale.
    pub fn multiplier(self) -> f64 {
        match self {
            TimeUnit::S => 1.0,
            TimeUnit::Ms => 1e-3,
            TimeUnit::Us => 1e-6,
            TimeUnit::Ns => 1e-9,
            TimeUnit::Ps => 1e-12,
            TimeUnit::Fs => 1e-15,
        }
    }

    pub fn from_suffix(s: &str) -> Option<TimeUnit> {
        Some(match s {
            "s" => TimeUnit::S,
            "ms" => TimeUnit::Ms,
            "us" => TimeUnit::Us,
            "ns" => TimeUnit::Ns,
            "ps" => TimeUnit::Ps,
            "fs" => TimeUnit::Fs,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    Begin,
    Fork,
    Function,
    Module,
    Task,
    VhdlArchitecture,
    VhdlRecord,
    Unknown,
}

impl ScopeKind {
    pub fn from_str(s: &str) -> ScopeKind {
        match s {
            "begin" => ScopeKind::Begin,
            "fork" => ScopeKind::Fork,
            "function" => ScopeKind::Function,
            "module" => ScopeKind::Module,
            "task" => ScopeKind::Task,
            "vhdl_architecture" => ScopeKind::VhdlArchitecture,
            "vhdl_record" => ScopeKind::VhdlRecord,
            _ => ScopeKind::Unknown,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Event,
    Integer,
    Parameter,
    Real,
    Reg,
    Supply0,
    Supply1,
    Time,
    Tri,
    Triand,
    Trior,
    Trireg,
    Tri0,
    Tri1,
    Wand,
    Wire,
    Wor,
    Logic,
    String,
    Unknown,
}

impl VarKind {
    pub fn from_str(s: &str) -> VarKind {
        match s {
            "event" => VarKind::Event,
            "integer" => VarKind::Integer,
            "parameter" => VarKind::Parameter,
            "real" => VarKind::Real,
            "reg" => VarKind::Reg,
            "supply0" => VarKind::Supply0,
            "supply1" => VarKind::Supply1,
            "time" => VarKind::Time,
            "tri" => VarKind::Tri,
            "triand" => VarKind::Triand,
            "trior" => VarKind::Trior,
            "trireg" => VarKind::Trireg,
            "tri0" => VarKind::Tri0,
            "tri1" => VarKind::Tri1,
            "wand" => VarKind::Wand,
            "wire" => VarKind::Wire,
            "wor" => VarKind::Wor,
            "logic" => VarKind::Logic,
            "string" => VarKind::String,
            _ => VarKind::Unknown,
        }
    }

    /// Numeric code stored in `Signals.Type`.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// A single `[i]` or `[msb:lsb]` suffix on an identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Idx {
    Single { index: i32 },
    Range { msb: i32, lsb: i32 },
}

impl std::fmt::Display for Idx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Idx::Single { index } => write!(f, "[{}]", index),
            Idx::Range { msb, lsb } => write!(f, "[{}:{}]", msb, lsb),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdT {
    pub name: String,
    pub indices: Vec<Idx>,
}

impl std::fmt::Display for IdT {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for idx in &self.indices {
            write!(f, "{}", idx)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SimulationCommand {
    Dumpall { value_changes: Vec<ValueChange> },
    Dumpoff { value_changes: Vec<ValueChange> },
    Dumpon { value_changes: Vec<ValueChange> },
    Dumpvars { value_changes: Vec<ValueChange> },
    SimulationTime { time: u64 },
    ValueChange { value_change: ValueChange },
    AttrBegin { text: String },
    AttrEnd { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ValueChange {
    Scalar { value: char, code: String },
    VectorBin { bits: String, code: String },
    VectorState { label: String, code: String },
    VectorReal { value: f64, code: String },
}

impl ValueChange {
    pub fn get_id_code(&self) -> &str {
        match self {
            ValueChange::Scalar { code, .. } => code,
            ValueChange::VectorBin { code, .. } => code,
            ValueChange::VectorState { code, .. } => code,
            ValueChange::VectorReal { code, .. } => code,
        }
    }

    /// The value rendered the way the Signal Store persists it: `Svalues.Value`.
    pub fn get_value(&self) -> String {
        match self {
            ValueChange::Scalar { value, .. } => value.to_string(),
            ValueChange::VectorBin { bits, .. } => bits.clone(),
            ValueChange::VectorState { label, .. } => label.clone(),
            ValueChange::VectorReal { value, .. } => value.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn id_t_renders_repeated_indices() {
        let id = IdT {
            name: "mem".to_string(),
            indices: vec![Idx::Single { index: 48 }, Idx::Range { msb: 7, lsb: 0 }],
        };
        assert_eq!(id.to_string(), "mem[48][7:0]");
    }

    #[test]
    fn json_roundtrip_omits_nothing_required() {
        let vc = ValueChange::Scalar {
            value: '1',
            code: "!".to_string(),
        };
        let json = serde_json::to_string(&vc).unwrap();
        let back: ValueChange = serde_json::from_str(&json).unwrap();
        assert_eq!(vc, back);
    }
}
