use accounts_auth::{Account, AccountState, Email, EmailAddress, Role, RoleName, RoleTree};
use accounts_core::{AccountId, EmailId, RoleId};

/// Read-only lookups over committed state.
///
/// Commit rules only ever see committed data through this trait; entities
/// pending in the current transaction are not visible here.
pub trait AccountsQuery {
    fn roles(&self) -> &RoleTree;

    fn find_role(&self, id: &RoleId) -> Option<&Role> {
        self.roles().get(id)
    }

    fn find_role_by_name(&self, name: &RoleName) -> Option<&Role> {
        self.roles().find_by_name(name)
    }

    fn find_account(&self, id: &AccountId) -> Option<&Account>;

    /// The earliest inserted account holding `role`.
    fn find_account_in_role(&self, role: &RoleId) -> Option<&Account>;

    /// Accounts holding `role`, in insertion order.
    fn accounts_in_role(&self, role: &RoleId) -> Vec<&Account>;

    /// Accounts in lifecycle `state`, in insertion order.
    fn accounts_in_state(&self, state: AccountState) -> Vec<&Account>;

    fn find_email(&self, id: &EmailId) -> Option<&Email>;

    fn find_email_by_address(&self, address: &EmailAddress) -> Option<&Email>;

    /// Case-insensitive lookup from raw input; `None` for malformed input.
    fn find_email_by_raw_address(&self, address: &str) -> Option<&Email> {
        let address = EmailAddress::parse(address).ok()?;
        self.find_email_by_address(&address)
    }

    /// Emails of one account, ordered by id.
    fn account_emails(&self, account: &AccountId) -> Vec<&Email>;

    fn default_email(&self, account: &AccountId) -> Option<&Email> {
        self.account_emails(account)
            .into_iter()
            .find(|e| e.is_default())
    }

    /// The first account ever committed with the administrator role.
    fn first_administrator(&self) -> Option<&Account>;
}
