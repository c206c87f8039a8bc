use crate::error::DecorationError;
use cedar_policy::{ParseErrors, PolicySet};

/// Compile Cedar policy text into a `PolicySet`.
///
/// Any Cedar parse errors are mapped into `DecorationError::PolicyParse`.
///
/// Example:
/// ```rust
/// use acl_decorator::compile_policy;
/// let policy_text = r#"
///     permit (principal, action == Action::"invoke", resource);
///     forbid (principal == User::"guest", action, resource);
/// "#;
/// let set = compile_policy(policy_text).unwrap();
/// assert!(set.num_of_policies() >= 1);
/// ```
pub fn compile_policy(text: &str) -> Result<PolicySet, DecorationError> {
    text.parse()
        .map_err(|e: ParseErrors| DecorationError::PolicyParse(e.to_string()))
}
