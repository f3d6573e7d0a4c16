use std::collections::BTreeMap;

use tracing::warn;

use crate::tenant::TenantId;

/// Maps dialed numbers to tenants from a table injected at construction.
///
/// A miss never fails inbound call handling: an unmapped number resolves to
/// the default tenant with a logged warning.
pub struct TenantResolver {
    numbers: BTreeMap<String, TenantId>,
    default_tenant: TenantId,
}

impl TenantResolver {
    pub fn new(numbers: BTreeMap<String, TenantId>, default_tenant: TenantId) -> Self {
        Self { numbers, default_tenant }
    }

    pub fn resolve(&self, dialed_number: &str) -> TenantId {
        let clean = dialed_number.trim();
        if let Some(tenant) = self.numbers.get(clean) {
            return tenant.clone();
        }
        warn!(
            dialed_number = %clean,
            default_tenant = %self.default_tenant,
            "no tenant mapping for dialed number, using default"
        );
        self.default_tenant.clone()
    }

    pub fn default_tenant(&self) -> &TenantId {
        &self.default_tenant
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::TenantResolver;
    use crate::tenant::TenantId;

    fn resolver() -> TenantResolver {
        let mut numbers = BTreeMap::new();
        numbers.insert("+61700000001".to_owned(), TenantId::from("cannonhill"));
        TenantResolver::new(numbers, TenantId::from("cannonhill"))
    }

    #[test]
    fn exact_match_resolves_mapped_tenant() {
        assert_eq!(resolver().resolve("+61700000001"), TenantId::from("cannonhill"));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(resolver().resolve(" +61700000001 "), TenantId::from("cannonhill"));
    }

    #[test]
    fn unmapped_number_falls_back_to_default_tenant() {
        assert_eq!(resolver().resolve("+15550000000"), TenantId::from("cannonhill"));
        assert_eq!(resolver().resolve(""), TenantId::from("cannonhill"));
    }
}
