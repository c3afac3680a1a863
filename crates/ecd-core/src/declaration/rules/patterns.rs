//! Common regex patterns for customs declaration extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Start of the filled-in data (declaration type + country, e.g. EXMK)
    pub static ref DATA_SECTION_MARKER: Regex = Regex::new(
        r"^(EX|IM)[A-Z]{2}$"
    ).unwrap();

    pub static ref LRN_MARKER: Regex = Regex::new(
        r"LRN\s*:"
    ).unwrap();

    // Tax identification number: country prefix + digits
    pub static ref TIN_TOKEN: Regex = Regex::new(
        r"\b([A-Z]{2})([0-9]{8,16})\b"
    ).unwrap();

    pub static ref TIN_LINE: Regex = Regex::new(
        r"^([A-Z]{2})([0-9]{8,16})$"
    ).unwrap();

    // Dates
    pub static ref SLASH_DATE: Regex = Regex::new(
        r"\b([0-9]{2})/([0-9]{2})/([0-9]{4})\b"
    ).unwrap();

    pub static ref DATE_LABEL: Regex = Regex::new(
        r"(?i)\b(датум|date)\b"
    ).unwrap();

    // Masses
    pub static ref MASS_BEFORE_KGM: Regex = Regex::new(
        r"([0-9][0-9.,]*)\s*KGM\b"
    ).unwrap();

    pub static ref NUMBER_LINE: Regex = Regex::new(
        r"^[0-9]+(?:[.,][0-9]+)*$"
    ).unwrap();

    pub static ref NUMBER_TOKEN: Regex = Regex::new(
        r"[0-9]+(?:[.,][0-9]+)*"
    ).unwrap();

    pub static ref GROSS_MASS_LABEL: Regex = Regex::new(
        r"(?i)(бруто\s*маса|gross\s*mass)"
    ).unwrap();

    // Transport
    pub static ref VEHICLE_ID: Regex = Regex::new(
        r"^([A-Z]{2}[0-9]{4}[A-Z]{2}(?:/[A-Z]{2}[0-9]{4}[A-Z]{2})?)$"
    ).unwrap();

    pub static ref COUNTRY_CODE: Regex = Regex::new(
        r"^[A-Z]{2}$"
    ).unwrap();

    pub static ref SHORT_CODE: Regex = Regex::new(
        r"^[A-Z]{2,3}$"
    ).unwrap();

    pub static ref SINGLE_DIGIT: Regex = Regex::new(
        r"^[1-9]$"
    ).unwrap();

    pub static ref OFFICE_CODE: Regex = Regex::new(
        r"^[0-9]{4}$"
    ).unwrap();

    // Parties
    pub static ref EXPORTER_LABEL: Regex = Regex::new(
        r"(?i)(испраќач\s*/\s*извозник|consignor\s*/\s*exporter)"
    ).unwrap();

    pub static ref CONSIGNEE_LABEL: Regex = Regex::new(
        r"(?i)\b(примач|consignee)\b"
    ).unwrap();

    pub static ref SECTION_LABEL: Regex = Regex::new(
        r"(?i)(испраќач|извозник|consignor|exporter|примач|consignee|застапник|declarant|декларант|пломби|seals)"
    ).unwrap();

    pub static ref STREET_MARKER: Regex = Regex::new(
        r"(?i)(ул\.|бул\.|str\.)"
    ).unwrap();

    pub static ref POSTAL_CITY: Regex = Regex::new(
        r"\b([0-9]{4,6})\s+([^\d,]+?)\s*$"
    ).unwrap();

    pub static ref REFERENCE_NUMBER: Regex = Regex::new(
        r"^[0-9]{5,7}$"
    ).unwrap();

    // Seals
    pub static ref SEAL_LABEL: Regex = Regex::new(
        r"(?i)\b(пломби|seals?)\b"
    ).unwrap();

    pub static ref SEAL_ID: Regex = Regex::new(
        r"^[A-Z0-9][A-Z0-9\-]{3,}$"
    ).unwrap();

    // Goods
    pub static ref COMMODITY_CODE: Regex = Regex::new(
        r"^[0-9]{8}$"
    ).unwrap();

    pub static ref PACKAGE_INLINE: Regex = Regex::new(
        r"^([0-9]+)\s+(PX|CT|BX|PA|PK|CS|CR)$"
    ).unwrap();

    pub static ref PALLET_MARKER: Regex = Regex::new(
        r"(?i)^палета[.:]?$"
    ).unwrap();

    pub static ref UN_DANGEROUS_GOODS: Regex = Regex::new(
        r"\bUN\s?([0-9]{4})\b"
    ).unwrap();

    pub static ref PREVIOUS_DOCUMENT: Regex = Regex::new(
        r"(\w+)\(([^)]+)\)"
    ).unwrap();
}

/// Package kind codes recognized on goods items.
pub const PACKAGE_KINDS: [&str; 7] = ["PX", "CT", "BX", "PA", "PK", "CS", "CR"];

/// Previous document types kept on goods items.
pub const DOCUMENT_TYPES: [&str; 8] = ["5010", "5016", "5009", "POAN", "5069", "AUN", "5077", "T1"];

/// Delivery terms that follow the container indicator.
pub const DELIVERY_TERMS: [&str; 6] = ["CPT", "CIF", "FOB", "EXW", "FCA", "DAP"];

/// Names that announce the country of dispatch.
pub const DISPATCH_COUNTRY_NAMES: [&str; 2] = ["МАКЕДОНИЈА", "MACEDONIA"];

/// Destination country names looked up before reading the code.
pub const DESTINATION_COUNTRY_NAMES: [&str; 24] = [
    "ФРАНЦИЈА", "ГЕРМАНИЈА", "ИТАЛИЈА", "СРБИЈА", "ГРЦИЈА", "БУГАРИЈА", "АЛБАНИЈА",
    "КОСОВО", "ХРВАТСКА", "СЛОВЕНИЈА", "АВСТРИЈА", "ХОЛАНДИЈА", "ПОЛСКА", "ТУРЦИЈА",
    "FRANCE", "GERMANY", "ITALY", "ITALIA", "SERBIA", "GREECE", "BULGARIA", "AUSTRIA",
    "NETHERLANDS", "POLAND",
];

/// Single-letter sub-box markers that never carry data.
pub const BOX_MARKERS: [&str; 4] = ["а", "б", "в", "г"];
