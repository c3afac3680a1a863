//! Customs declaration data structures.
//!
//! Field names follow the declaration schema keys so the serialized record
//! can be exchanged with customs tooling unchanged. Absent values serialize
//! as `null`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Structured customs declaration record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Declaration {
    /// Declaration header.
    #[serde(rename = "HEAHEA")]
    pub header: Header,

    /// Consignor / exporter.
    #[serde(rename = "TRAEXPEX1")]
    pub exporter: Exporter,

    /// Consignee.
    #[serde(rename = "TRACONCE1")]
    pub consignee: Consignee,

    /// Seal information.
    #[serde(rename = "SEAINFSLI")]
    pub seals: SealInfo,

    /// Goods items in document order.
    #[serde(rename = "GOOITEGDS")]
    pub goods: Vec<GoodsItem>,
}

/// Declaration header (HEAHEA).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    /// Total gross mass in kilograms.
    #[serde(rename = "TotGroMasHEA307", with = "rust_decimal::serde::float_option")]
    pub total_gross_mass: Option<Decimal>,

    /// Identity of the means of transport at departure (plates).
    #[serde(rename = "IdeOfMeaOfTraAtDHEA78")]
    pub transport_identity: Option<String>,

    /// Nationality of the means of transport crossing the border.
    #[serde(rename = "NatOfMeaOfTraCroHEA87")]
    pub transport_nationality: Option<String>,

    /// Mode of transport at the border (single digit code).
    #[serde(rename = "TraModAtBorHEA76")]
    pub transport_mode: Option<String>,

    /// Country of dispatch code.
    #[serde(rename = "CouOfDisCodHEA55")]
    pub dispatch_country: Option<String>,

    /// Country of destination code.
    #[serde(rename = "CouOfDesCodHEA30")]
    pub destination_country: Option<String>,

    /// Container indicator (`0` or `1`).
    #[serde(rename = "ConIndHEA96")]
    pub container_indicator: Option<String>,

    /// Declaration place (office code and name).
    #[serde(rename = "DecPlaHEA394")]
    pub declaration_place: Option<String>,

    /// Declaration date, ISO formatted when valid.
    #[serde(rename = "DecDatHEA383")]
    pub declaration_date: Option<String>,
}

macro_rules! trader {
    (
        $(#[$meta:meta])*
        $name:ident {
            name: $nam:literal,
            tin: $tin:literal,
            street: $str:literal,
            postal_code: $pos:literal,
            city: $cit:literal,
            country: $cou:literal $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            /// Trader name.
            #[serde(rename = $nam)]
            pub name: Option<String>,
            /// Tax identification number.
            #[serde(rename = $tin)]
            pub tin: Option<String>,
            /// Street and number.
            #[serde(rename = $str)]
            pub street_and_number: Option<String>,
            /// Postal code.
            #[serde(rename = $pos)]
            pub postal_code: Option<String>,
            /// City.
            #[serde(rename = $cit)]
            pub city: Option<String>,
            /// Country code.
            #[serde(rename = $cou)]
            pub country: Option<String>,
        }

        impl $name {
            /// Fill absent fields from `other`.
            pub fn merge(&mut self, other: $name) {
                merge_opt(&mut self.name, other.name);
                merge_opt(&mut self.tin, other.tin);
                merge_opt(&mut self.street_and_number, other.street_and_number);
                merge_opt(&mut self.postal_code, other.postal_code);
                merge_opt(&mut self.city, other.city);
                merge_opt(&mut self.country, other.country);
            }
        }
    };
}

trader! {
    /// Consignor / exporter (TRAEXPEX1).
    Exporter {
        name: "NamEX17",
        tin: "TINEX159",
        street: "StrAndNumEX122",
        postal_code: "PosCodEX123",
        city: "CitEX124",
        country: "CouEX125",
    }
}

trader! {
    /// Consignee (TRACONCE1).
    Consignee {
        name: "NamCE17",
        tin: "TINCE159",
        street: "StrAndNumCE122",
        postal_code: "PosCodCE123",
        city: "CitCE124",
        country: "CouCE125",
    }
}

/// Seal information (SEAINFSLI).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealInfo {
    /// Number of seals.
    #[serde(rename = "SeaNumSLI2")]
    pub count: Option<u32>,

    /// Seal identifiers.
    #[serde(rename = "SEAIDSID")]
    pub ids: Vec<SealId>,
}

/// A single seal identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SealId {
    #[serde(rename = "SeaIdeSID1")]
    pub id: String,
}

/// Goods item (GOOITEGDS).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoodsItem {
    /// Item number, 1-based, assigned after merging.
    #[serde(rename = "IteNumGDS7")]
    pub item_number: String,

    /// Gross mass in kilograms.
    #[serde(rename = "GroMasGDS46", with = "rust_decimal::serde::float_option")]
    pub gross_mass: Option<Decimal>,

    /// Goods description.
    #[serde(rename = "GooDesGDS23")]
    pub description: Option<String>,

    /// UN dangerous goods code.
    #[serde(rename = "UNDanGooCodGDI1")]
    pub un_dangerous_goods_code: Option<String>,

    /// Commodity code.
    #[serde(rename = "COMCODGODITM")]
    pub commodity_code: CommodityCode,

    /// Packages.
    #[serde(rename = "PACGS2")]
    pub packages: Vec<Package>,

    /// Previous administrative documents.
    #[serde(rename = "PRODOCDC2")]
    pub documents: Vec<PreviousDocument>,
}

/// Combined nomenclature code of a goods item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommodityCode {
    #[serde(rename = "ComNomCMD1")]
    pub code: Option<String>,
}

/// Package line of a goods item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Kind of packages (`PX`, `CT`, ...).
    #[serde(rename = "KinOfPacGS23")]
    pub kind: String,

    /// Number of packages.
    #[serde(rename = "NumOfPacGS24")]
    pub count: Option<String>,

    /// Marks and numbers.
    #[serde(rename = "MarNumOfPacGS21")]
    pub marks: Option<String>,
}

/// Previous document reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviousDocument {
    #[serde(rename = "DocTypDC21")]
    pub doc_type: String,

    #[serde(rename = "DocRefDC23")]
    pub reference: String,
}

/// A field value that was found but failed its format check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Dotted schema path, e.g. `TRAEXPEX1.TINEX159`.
    pub field: String,
    /// Value as recovered.
    pub value: String,
    /// Why the value was rejected.
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl From<FieldIssue> for ExtractionError {
    fn from(issue: FieldIssue) -> Self {
        ExtractionError::FieldFormatInvalid {
            field: issue.field,
            value: issue.value,
            reason: issue.reason,
        }
    }
}

impl Header {
    /// Fill absent fields from `other`.
    pub fn merge(&mut self, other: Header) {
        merge_opt(&mut self.total_gross_mass, other.total_gross_mass);
        merge_opt(&mut self.transport_identity, other.transport_identity);
        merge_opt(&mut self.transport_nationality, other.transport_nationality);
        merge_opt(&mut self.transport_mode, other.transport_mode);
        merge_opt(&mut self.dispatch_country, other.dispatch_country);
        merge_opt(&mut self.destination_country, other.destination_country);
        merge_opt(&mut self.container_indicator, other.container_indicator);
        merge_opt(&mut self.declaration_place, other.declaration_place);
        merge_opt(&mut self.declaration_date, other.declaration_date);
    }
}

impl Declaration {
    /// Merge a later page's partial record into this one.
    ///
    /// Singleton fields keep the first non-empty value. Goods items are
    /// appended in order and renumbered from 1.
    pub fn merge(&mut self, other: Declaration) {
        self.header.merge(other.header);
        self.exporter.merge(other.exporter);
        self.consignee.merge(other.consignee);

        merge_opt(&mut self.seals.count, other.seals.count);
        if self.seals.ids.is_empty() {
            self.seals.ids = other.seals.ids;
        }

        self.goods.extend(other.goods);
        self.renumber_goods();
    }

    /// Assign item numbers 1..n in current order.
    pub fn renumber_goods(&mut self) {
        for (i, item) in self.goods.iter_mut().enumerate() {
            item.item_number = (i + 1).to_string();
        }
    }
}

fn merge_opt<T>(slot: &mut Option<T>, other: Option<T>) {
    if slot.is_none() {
        *slot = other;
    }
}
