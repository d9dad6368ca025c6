//! Parameter registry and slot catalogs
//!
//! This module owns the fixed, versioned-by-code name/unit tables that define
//! the addressable parameter space of one datasheet (general, medium, pump,
//! driver) and of one sales-catalog record, plus the per-section value state
//! the engines populate.

/// Name/unit table of the general (identity) group
const GENERAL_FIELDS: &[(&str, Option<&str>)] = &[
    ("设备位号", None),
    ("设备名称", None),
    ("设备数量", None),
    ("工程/项目/装置", None),
    ("用户", None),
    ("设计方", None),
    ("制造厂", None),
    ("日期", None),
];

/// Name/unit table of the medium (process conditions) group
const MEDIUM_FIELDS: &[(&str, Option<&str>)] = &[
    ("名称", None),
    ("最小温度", Some("℃")),
    ("正常温度", Some("℃")),
    ("额定温度", Some("℃")),
    ("最大温度", Some("℃")),
    ("密度", Some("kg/m³")),
    ("粘度", Some("mPa.s")),
    ("最小入口压力", Some("MPaG")),
    ("正常入口压力", Some("MPaG")),
    ("额定入口压力", Some("MPaG")),
    ("最大入口压力", Some("MPaG")),
    ("最小出口压力", Some("MPaG")),
    ("正常出口压力", Some("MPaG")),
    ("额定出口压力", Some("MPaG")),
    ("最大出口压力", Some("MPaG")),
    ("最小流量", Some("m³/h")),
    ("正常流量", Some("m³/h")),
    ("额定流量", Some("m³/h")),
    ("最大流量", Some("m³/h")),
    ("扬程", Some("m")),
    ("NPSHA", Some("m")),
];

/// Name/unit table of the pump (equipment) group
const PUMP_FIELDS: &[(&str, Option<&str>)] = &[
    ("NPSHR", Some("m")),
    ("型号", None),
    ("型式", None),
    ("材质", None),
    ("流量", Some("m³/h")),
    ("扬程", Some("m")),
    ("效率", Some("%")),
    ("轴功率", Some("kW")),
    ("密封分类编码", None),
    ("密封冲洗方案", None),
    ("冷却水管路", None),
];

/// Name/unit table of the driver group
const DRIVER_FIELDS: &[(&str, Option<&str>)] = &[
    ("型号", None),
    ("功率", Some("kW")),
    ("防爆/防护等级", None),
    ("电压/频率/相", None),
];

/// Name/unit table of one sales-catalog record (63 fields)
const CATALOG_FIELDS: &[(&str, Option<&str>)] = &[
    ("序号", None),
    ("计划号", None),
    ("序号2", None),
    ("型号", None),
    ("原型号", None),
    ("流量", Some("m³/h")),
    ("扬程", Some("m")),
    ("效率", Some("%")),
    ("汽蚀", Some("m")),
    ("转速", None),
    ("泵型式", None),
    ("泵标牌", None),
    ("电机制造厂", None),
    ("泵体材料", None),
    ("叶轮材料", None),
    ("轴材料", None),
    ("泵体口环材料", None),
    ("叶轮口环材料", None),
    ("导叶材料", None),
    ("材料级数", None),
    ("RPM(转速)", None),
    ("额定叶轮直径", None),
    ("最大叶轮直径", None),
    ("最小叶轮直径", None),
    ("轴功率", Some("kW")),
    ("泵效率", Some("%")),
    ("最佳效率点流量", Some("m³/h")),
    ("优先工作区起值", Some("m³/h")),
    ("优先工作区止值", Some("m³/h")),
    ("允许工作区起值", Some("m³/h")),
    ("允许工作区止值", Some("m³/h")),
    ("额定叶轮的最大扬程", Some("m")),
    ("额定叶轮的最大功率", Some("kW")),
    ("额定流量下的NPSH3", Some("m")),
    ("比转速", Some("ns(美制)")),
    ("气蚀比转速", Some("加仑/分钟(美制)")),
    ("吸入口", None),
    ("排出口", None),
    ("排液口", None),
    ("壳体型式", None),
    ("壳体承压等级MAWP压力", Some("MPaG")),
    ("壳体承压等级MAWP温度", Some("℃")),
    ("壳体承压等级水压试验压力", Some("MPaG")),
    ("壳体承压等级水压试验温度", Some("℃")),
    ("转向:(从联轴器端看)", None),
    ("制造厂", None),
    ("中节长", None),
    ("径向轴承型式", None),
    ("径向轴承数量", None),
    ("径向轴承型号", None),
    ("推力轴承型式", None),
    ("推力轴承数量", None),
    ("推力轴承型号", None),
    ("润滑油粘度的ISO等级号", None),
    ("轴承箱冷却水", Some("m³/h")),
    ("换热器冷却水", Some("m³/h")),
    ("总冷却水", Some("m³/h")),
    ("泵重量", Some("kg")),
    ("驱动机重量", Some("kg")),
    ("底座重量", Some("kg")),
    ("总重", Some("kg")),
    ("曲线号", None),
    ("安装尺寸图号", None),
];

/// Number of slots in one sales-catalog record
pub const CATALOG_SLOTS: usize = 63;

/// Well-known slot indices within the general group
pub mod general {
    pub const TAG_NUMBER: usize = 0;
    pub const DEVICE_NAME: usize = 1;
    pub const DEVICE_COUNT: usize = 2;
    pub const PROJECT: usize = 3;
    pub const USER: usize = 4;
}

/// Well-known slot indices within the medium group
pub mod medium {
    pub const NAME: usize = 0;
    pub const NORMAL_FLOW: usize = 16;
    pub const RATED_FLOW: usize = 17;
    pub const LIFT: usize = 19;
}

/// Well-known slot indices within a sales-catalog record
pub mod catalog {
    pub const MODEL: usize = 3;
    pub const FLOW: usize = 5;
    pub const LIFT: usize = 6;
    pub const EFFICIENCY: usize = 7;
    pub const CASING_MATERIAL: usize = 13;
    pub const IMPELLER_MATERIAL: usize = 14;
    pub const SHAFT_MATERIAL: usize = 15;
    pub const CASING_RING_MATERIAL: usize = 16;
    pub const IMPELLER_RING_MATERIAL: usize = 17;
    pub const DIFFUSER_MATERIAL: usize = 18;
    pub const SHAFT_POWER: usize = 24;
    pub const PUMP_EFFICIENCY: usize = 25;
    pub const PREFERRED_RANGE_START: usize = 27;
    pub const PREFERRED_RANGE_END: usize = 28;
    pub const ALLOWED_RANGE_START: usize = 29;
    pub const ALLOWED_RANGE_END: usize = 30;
}

/// Parameter group of one extraction slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamGroup {
    General,
    Medium,
    Pump,
    Driver,
}

impl ParamGroup {
    pub const ALL: [ParamGroup; 4] = [
        ParamGroup::General,
        ParamGroup::Medium,
        ParamGroup::Pump,
        ParamGroup::Driver,
    ];

    /// Positional index of this group in the configuration's matcher table
    pub fn index(self) -> usize {
        match self {
            ParamGroup::General => 0,
            ParamGroup::Medium => 1,
            ParamGroup::Pump => 2,
            ParamGroup::Driver => 3,
        }
    }

    /// Group at a configuration table position
    pub fn from_index(index: usize) -> Option<ParamGroup> {
        ParamGroup::ALL.get(index).copied()
    }

    /// Number of declared slots in this group
    pub fn slot_count(self) -> usize {
        self.fields().len()
    }

    fn fields(self) -> &'static [(&'static str, Option<&'static str>)] {
        match self {
            ParamGroup::General => GENERAL_FIELDS,
            ParamGroup::Medium => MEDIUM_FIELDS,
            ParamGroup::Pump => PUMP_FIELDS,
            ParamGroup::Driver => DRIVER_FIELDS,
        }
    }

    /// Prefix prepended to slot names when rendered outside their group
    fn display_prefix(self) -> &'static str {
        match self {
            ParamGroup::General => "",
            ParamGroup::Medium => "介质",
            ParamGroup::Pump => "泵",
            ParamGroup::Driver => "引擎",
        }
    }
}

/// Identity of one extraction slot: group plus position within the group
pub type SlotId = (ParamGroup, usize);

/// An extracted or selected parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view: numbers directly, text via a decimal parse
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(t) => t.trim().parse().ok(),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<String> for ParamValue {
    fn from(t: String) -> Self {
        ParamValue::Text(t)
    }
}

impl From<&str> for ParamValue {
    fn from(t: &str) -> Self {
        ParamValue::Text(t.to_string())
    }
}

/// One named, unit-tagged parameter slot
///
/// The unit is fixed at construction and decides whether matched text must
/// coerce to a number (unit present) or stays text (no unit).
#[derive(Debug, Clone)]
pub struct ParamSlot {
    name: String,
    unit: Option<&'static str>,
    value: Option<ParamValue>,
}

impl ParamSlot {
    fn new(name: String, unit: Option<&'static str>) -> Self {
        ParamSlot {
            name,
            unit,
            value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.unit
    }

    pub fn value(&self) -> Option<&ParamValue> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: ParamValue) {
        self.value = Some(value);
    }

    /// Display title: the name, with the unit appended when present
    pub fn title(&self) -> String {
        match self.unit {
            Some(unit) => format!("{}({})", self.name, unit),
            None => self.name.clone(),
        }
    }
}

/// Populated parameter registry for one detected document section
///
/// Created at the section's first physical page; `found` keeps discovery
/// order so downstream rendering and export touch only discovered fields.
#[derive(Debug, Clone)]
pub struct SheetData {
    groups: Vec<Vec<ParamSlot>>,
    found: Vec<SlotId>,
}

impl SheetData {
    pub fn new() -> Self {
        let groups = ParamGroup::ALL
            .iter()
            .map(|group| {
                group
                    .fields()
                    .iter()
                    .map(|(name, unit)| {
                        ParamSlot::new(format!("{}{}", group.display_prefix(), name), *unit)
                    })
                    .collect()
            })
            .collect();
        SheetData {
            groups,
            found: Vec::new(),
        }
    }

    pub fn slot(&self, id: SlotId) -> &ParamSlot {
        &self.groups[id.0.index()][id.1]
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut ParamSlot {
        &mut self.groups[id.0.index()][id.1]
    }

    /// Record a slot as discovered; append order is discovery order
    pub fn mark_found(&mut self, id: SlotId) {
        self.found.push(id);
    }

    pub fn found(&self) -> &[SlotId] {
        &self.found
    }

    /// Discovered slots in discovery order
    pub fn found_slots(&self) -> impl Iterator<Item = &ParamSlot> {
        self.found.iter().map(|id| self.slot(*id))
    }

    /// The identity fields used to label one extracted section
    pub fn id_slots(&self) -> [&ParamSlot; 6] {
        [
            self.slot((ParamGroup::General, general::TAG_NUMBER)),
            self.slot((ParamGroup::General, general::DEVICE_NAME)),
            self.slot((ParamGroup::General, general::DEVICE_COUNT)),
            self.slot((ParamGroup::General, general::PROJECT)),
            self.slot((ParamGroup::General, general::USER)),
            self.slot((ParamGroup::Medium, medium::NAME)),
        ]
    }

    /// The `(flow, lift)` pair catalog candidates are matched against
    ///
    /// Flow is the greater of the rated and normal flows, treating an absent
    /// field as 0; when both are absent there is no flow target. Lift is the
    /// lift field when present.
    pub fn flow_lift_target(&self) -> (Option<f64>, Option<f64>) {
        let rated = self
            .slot((ParamGroup::Medium, medium::RATED_FLOW))
            .value()
            .and_then(ParamValue::as_f64);
        let normal = self
            .slot((ParamGroup::Medium, medium::NORMAL_FLOW))
            .value()
            .and_then(ParamValue::as_f64);

        let flow = match (rated, normal) {
            (None, None) => None,
            (rated, normal) => Some(rated.unwrap_or(0.0).max(normal.unwrap_or(0.0))),
        };

        let lift = self
            .slot((ParamGroup::Medium, medium::LIFT))
            .value()
            .and_then(ParamValue::as_f64);
        (flow, lift)
    }
}

impl Default for SheetData {
    fn default() -> Self {
        SheetData::new()
    }
}

/// One sales-catalog record: the full 63-slot write-target set
///
/// `written` records which slots the writeback engine successfully located
/// and inserted, in write order.
#[derive(Debug, Clone)]
pub struct CatalogRecord {
    slots: Vec<ParamSlot>,
    written: Vec<usize>,
}

impl CatalogRecord {
    pub fn new() -> Self {
        let slots = CATALOG_FIELDS
            .iter()
            .map(|(name, unit)| ParamSlot::new((*name).to_string(), *unit))
            .collect();
        CatalogRecord {
            slots,
            written: Vec::new(),
        }
    }

    pub fn slot(&self, index: usize) -> &ParamSlot {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut ParamSlot {
        &mut self.slots[index]
    }

    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    pub fn mark_written(&mut self, index: usize) {
        self.written.push(index);
    }

    pub fn written(&self) -> &[usize] {
        &self.written
    }

    /// Written slots in write order
    pub fn written_slots(&self) -> impl Iterator<Item = &ParamSlot> {
        self.written.iter().map(|i| self.slot(*i))
    }
}

impl Default for CatalogRecord {
    fn default() -> Self {
        CatalogRecord::new()
    }
}

/// Candidate catalog records matched to one extracted section
///
/// Which candidate is actually used is chosen externally; `selected` stays
/// `None` until then. `reset` makes repeated catalog loads safe.
#[derive(Debug, Clone)]
pub struct CandidateGroup {
    source: usize,
    records: Vec<CatalogRecord>,
    selected: Option<usize>,
}

impl CandidateGroup {
    /// `source` is the index of the extracted section this group serves
    pub fn new(source: usize) -> Self {
        CandidateGroup {
            source,
            records: Vec::new(),
            selected: None,
        }
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn add_record(&mut self) -> &mut CatalogRecord {
        self.records.push(CatalogRecord::new());
        self.records.last_mut().unwrap()
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn set_selected(&mut self, index: Option<usize>) {
        self.selected = index;
    }

    pub fn selected_record(&self) -> Option<&CatalogRecord> {
        self.selected.and_then(|i| self.records.get(i))
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.selected = None;
    }
}
