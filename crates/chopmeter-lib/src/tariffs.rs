use std::collections::HashMap;

pub const FALLBACK_COUNTRY: &str = "GH";

#[derive(Debug, Clone, PartialEq)]
pub struct CountryTariff {
    code: &'static str,
    name: &'static str,
    currency_code: &'static str,
    currency_symbol: &'static str,
    default_tariff: f64,
}

impl CountryTariff {
    pub const fn new(
        code: &'static str,
        name: &'static str,
        currency_code: &'static str,
        currency_symbol: &'static str,
        default_tariff: f64,
    ) -> Self {
        Self {
            code,
            name,
            currency_code,
            currency_symbol,
            default_tariff,
        }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn currency_code(&self) -> &'static str {
        self.currency_code
    }

    pub fn currency_symbol(&self) -> &'static str {
        self.currency_symbol
    }

    pub fn default_tariff(&self) -> f64 {
        self.default_tariff
    }

    pub fn format_amount(&self, amount: f64) -> String {
        format!("{} {:.2}", self.currency_symbol, amount)
    }
}

static BUILT_IN: [CountryTariff; 6] = [
    CountryTariff::new("GH", "Ghana", "GHS", "GH\u{20B5}", 2.0),
    CountryTariff::new("NG", "Nigeria", "NGN", "\u{20A6}", 209.5),
    CountryTariff::new("ZA", "South Africa", "ZAR", "R", 3.5),
    CountryTariff::new("KE", "Kenya", "KES", "KSh", 12.23),
    CountryTariff::new("GB", "United Kingdom", "GBP", "\u{00A3}", 0.2684),
    CountryTariff::new("US", "United States", "USD", "$", 0.1778),
];

/// Residential default tariffs by country.
pub struct TariffProvider {
    countries: HashMap<&'static str, CountryTariff>,
}

impl TariffProvider {
    pub fn new() -> Self {
        let countries = BUILT_IN
            .iter()
            .map(|country| (country.code, country.clone()))
            .collect();
        Self { countries }
    }

    pub fn get(&self, code: &str) -> Option<&CountryTariff> {
        self.countries.get(code.to_ascii_uppercase().as_str())
    }

    /// Looks up a country, falling back to Ghana for unknown codes.
    pub fn country_or_default(&self, code: &str) -> &CountryTariff {
        self.get(code)
            .or_else(|| self.countries.get(FALLBACK_COUNTRY))
            .unwrap_or(&BUILT_IN[0])
    }

    pub fn default_tariff(&self, code: &str) -> f64 {
        self.country_or_default(code).default_tariff()
    }

    pub fn supported_countries(&self) -> Vec<&CountryTariff> {
        let mut countries: Vec<_> = self.countries.values().collect();
        countries.sort_by_key(|country| country.code);
        countries
    }
}

impl Default for TariffProvider {
    fn default() -> Self {
        Self::new()
    }
}
