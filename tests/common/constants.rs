use catalog_categories::category::TenantId;

pub const TENANT_A: TenantId = TenantId(1);
pub const TENANT_B: TenantId = TenantId(2);
