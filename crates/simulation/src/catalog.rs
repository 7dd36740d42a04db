//! Lookup tables used to synthesise plausible records.
//!
//! Prices are whole Iraqi dinars.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProductTemplate {
    pub name: &'static str,
    pub category: &'static str,
    pub cost: i64,
    pub price: i64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SupplierTemplate {
    pub name: &'static str,
    pub phone: &'static str,
}

pub const FIRST_NAMES: &[&str] = &[
    "Ahmed", "Mohammed", "Ali", "Hussein", "Abbas", "Kadhim", "Jaafar", "Mustafa", "Haider",
    "Zaid", "Fatima", "Zainab", "Maryam", "Sara", "Noor", "Huda", "Ruqaya", "Amna", "Khadija",
    "Yasmin",
];

pub const LAST_NAMES: &[&str] = &[
    "Al-Musawi",
    "Al-Husseini",
    "Al-Alawi",
    "Al-Kadhimi",
    "Al-Baghdadi",
    "Al-Najafi",
    "Al-Karbalai",
    "Al-Samarrai",
    "Al-Tamimi",
    "Al-Jubouri",
    "Al-Shammari",
    "Al-Obaidi",
    "Al-Rawi",
    "Al-Maliki",
];

pub const COMPANIES: &[&str] = &[
    "Al-Noor Trading Co",
    "Al-Amal Establishment",
    "Al-Furat Company",
    "Dijla Group",
    "Babel Company",
    "Al-Salam Establishment",
    "Al-Rafidain Company",
    "Al-Karkh Group",
    "Al-Rusafa Company",
    "Basra Establishment",
];

pub const CITIES: &[&str] = &[
    "Baghdad",
    "Basra",
    "Najaf",
    "Karbala",
    "Erbil",
    "Sulaymaniyah",
    "Mosul",
    "Kirkuk",
];

pub const AREAS: &[&str] = &[
    "Karrada",
    "Mansour",
    "Zayouna",
    "Jadriya",
    "Kadhimiya",
    "Adhamiya",
    "Bayaa",
    "Dora",
];

pub const PRODUCTS: &[ProductTemplate] = &[
    ProductTemplate { name: "Dell Inspiron Laptop", category: "Electronics", cost: 450_000, price: 550_000 },
    ProductTemplate { name: "HP Pavilion Laptop", category: "Electronics", cost: 400_000, price: 500_000 },
    ProductTemplate { name: "Samsung 24\" Monitor", category: "Electronics", cost: 150_000, price: 200_000 },
    ProductTemplate { name: "HP LaserJet Printer", category: "Electronics", cost: 200_000, price: 280_000 },
    ProductTemplate { name: "Logitech Keyboard", category: "Accessories", cost: 25_000, price: 40_000 },
    ProductTemplate { name: "Wireless Mouse", category: "Accessories", cost: 15_000, price: 25_000 },
    ProductTemplate { name: "External Drive 1TB", category: "Storage", cost: 60_000, price: 85_000 },
    ProductTemplate { name: "USB Flash 32GB", category: "Storage", cost: 8_000, price: 15_000 },
    ProductTemplate { name: "HDMI Cable", category: "Cables", cost: 5_000, price: 10_000 },
    ProductTemplate { name: "Laptop Charger", category: "Accessories", cost: 20_000, price: 35_000 },
    ProductTemplate { name: "Laptop Bag", category: "Accessories", cost: 15_000, price: 30_000 },
    ProductTemplate { name: "Bluetooth Headphones", category: "Audio", cost: 30_000, price: 50_000 },
    ProductTemplate { name: "HD Webcam", category: "Electronics", cost: 40_000, price: 65_000 },
    ProductTemplate { name: "TP-Link Router", category: "Networking", cost: 35_000, price: 55_000 },
    ProductTemplate { name: "UPS 650VA", category: "Power", cost: 50_000, price: 75_000 },
];

pub const SUPPLIERS: &[SupplierTemplate] = &[
    SupplierTemplate { name: "Modern Technology Co", phone: "07801234567" },
    SupplierTemplate { name: "Advanced Electronics Establishment", phone: "07709876543" },
    SupplierTemplate { name: "Future Computer Co", phone: "07501112233" },
    SupplierTemplate { name: "Gulf Trading Group", phone: "07701234567" },
];

pub const TASK_TITLES: &[&str] = &[
    "Follow up customer order",
    "Update product prices",
    "Review inventory",
    "Prepare sales report",
    "Contact supplier",
    "Inspect goods quality",
    "Collect receivables",
    "Prepare shipment",
    "System maintenance",
    "Staff training",
];

/// Terms a simulated user types into product search.
pub const SEARCH_TERMS: &[&str] = &["dell", "hp", "tp-link", "router", "keyboard", "mouse"];

/// Fallback unit price when a product carries none.
pub const DEFAULT_UNIT_PRICE: i64 = 10_000;

/// Lowercase, whitespace stripped: the local part of a synthetic email.
pub fn email_local(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '"')
        .flat_map(char::to_lowercase)
        .collect()
}
