/// A clinic unit a visitor can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    pub name: &'static str,
    pub address: &'static str,
    /// WhatsApp number in international format.
    pub whatsapp: &'static str,
}

// All units are served by the same reception line for now.
const RECEPTION: &str = "+55 83 98877-6655";

pub const UNITS: [Unit; 3] = [
    Unit {
        name: "Unidade Centro",
        address: "Av. Epitácio Pessoa, 1200 - Centro",
        whatsapp: RECEPTION,
    },
    Unit {
        name: "Unidade Bessa",
        address: "Rua Infante Dom Henrique, 450 - Bessa",
        whatsapp: RECEPTION,
    },
    Unit {
        name: "Unidade Mangabeira",
        address: "Rua Josefa Taveira, 88 - Mangabeira",
        whatsapp: RECEPTION,
    },
];

pub fn unit(index: usize) -> Option<&'static Unit> {
    UNITS.get(index)
}

/// Number used by the contact page, which is not tied to a unit.
pub fn default_unit() -> &'static Unit {
    &UNITS[0]
}
