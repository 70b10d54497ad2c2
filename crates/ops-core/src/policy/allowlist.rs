use crate::config::Profile;
use crate::policy::PolicyError;

/// Admits a pass-through command iff its verb (first argv token) is in the
/// profile's allowlist for `family`, and refuses it up front if any
/// remaining token matches a configured dangerous-flag substring while
/// `dangerous_allowed` is false (§4.4). Never calls an adapter.
pub fn check(profile: &Profile, family: &str, argv: &[String]) -> Result<(), PolicyError> {
    let verb = argv.first().ok_or(PolicyError::EmptyCommand)?;

    let allowlist = profile
        .allowlist
        .get(family)
        .ok_or_else(|| PolicyError::FamilyNotAllowed(family.to_string()))?;

    if !allowlist.admits(verb) {
        return Err(PolicyError::VerbNotAllowed {
            family: family.to_string(),
            verb: verb.clone(),
        });
    }

    if !profile.dangerous_allowed {
        for token in &argv[1..] {
            if profile.dangerous_flags.iter().any(|flag| token.contains(flag.as_str())) {
                return Err(PolicyError::DangerousFlag(token.clone()));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllowlistVerbs;
    use std::collections::HashMap;

    fn profile_with(allowlist: HashMap<String, AllowlistVerbs>, dangerous_flags: Vec<String>, dangerous_allowed: bool) -> Profile {
        Profile {
            ssh_bastion: None,
            k8s_context: None,
            k8s_namespace: "default".into(),
            docker_endpoint: None,
            compose_files: vec![],
            allowlist,
            dangerous_flags,
            dangerous_allowed,
        }
    }

    #[test]
    fn admits_allowed_verb() {
        let mut allowlist = HashMap::new();
        allowlist.insert("kubectl".to_string(), AllowlistVerbs::Explicit(vec!["get".into()]));
        let profile = profile_with(allowlist, vec![], false);
        assert!(check(&profile, "kubectl", &["get".to_string(), "pods".to_string()]).is_ok());
    }

    #[test]
    fn refuses_verb_outside_allowlist() {
        let mut allowlist = HashMap::new();
        allowlist.insert("kubectl".to_string(), AllowlistVerbs::Explicit(vec!["get".into()]));
        let profile = profile_with(allowlist, vec![], false);
        let err = check(&profile, "kubectl", &["delete".to_string()]).unwrap_err();
        assert!(matches!(err, PolicyError::VerbNotAllowed { .. }));
    }

    #[test]
    fn refuses_dangerous_flag_when_not_allowed() {
        let mut allowlist = HashMap::new();
        allowlist.insert("kubectl".to_string(), AllowlistVerbs::Explicit(vec!["delete".into()]));
        let profile = profile_with(allowlist, vec!["--grace-period=0".to_string()], false);
        let err = check(
            &profile,
            "kubectl",
            &["delete".to_string(), "pod".to_string(), "--grace-period=0".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::DangerousFlag(_)));
    }

    #[test]
    fn admits_dangerous_flag_when_profile_allows_it() {
        let mut allowlist = HashMap::new();
        allowlist.insert("kubectl".to_string(), AllowlistVerbs::Explicit(vec!["delete".into()]));
        let profile = profile_with(allowlist, vec!["--grace-period=0".to_string()], true);
        assert!(check(
            &profile,
            "kubectl",
            &["delete".to_string(), "--grace-period=0".to_string()]
        )
        .is_ok());
    }
}
