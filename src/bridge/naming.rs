use crate::config::types::HelperRole;

/// Derives helper sandbox names from the owning sandbox's name.
pub trait HelperNaming: Send + Sync {
    fn helper_name(&self, owner: &str, role: HelperRole) -> String;
}

/// `!service-subuser-<owner>-<service>-<role>`.
///
/// The leading `!` cannot start a user-chosen sandbox name, which keeps
/// helpers out of the user namespace.
#[derive(Clone, Debug)]
pub struct ServiceHelperNaming {
    service: String,
}

impl ServiceHelperNaming {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

impl HelperNaming for ServiceHelperNaming {
    fn helper_name(&self, owner: &str, role: HelperRole) -> String {
        format!("!service-subuser-{}-{}-{}", owner, self.service, role)
    }
}
