//! cloud-init seed documents

/// Render the `user-data` document for a host
pub fn render_user_data(hostname: &str, username: &str, password: &str) -> String {
    format!(
        "#cloud-config\n\
         hostname: {hostname}\n\
         manage_etc_hosts: true\n\
         users:\n  \
           - name: {username}\n    \
             sudo: ALL=(ALL) NOPASSWD:ALL\n    \
             groups: users, admin\n    \
             home: /home/{username}\n    \
             shell: /bin/bash\n    \
             lock_passwd: false\n\
         ssh_pwauth: true\n\
         disable_root: false\n\
         chpasswd:\n  \
           list: |\n    \
             {username}:{password}\n  \
           expire: false\n"
    )
}

/// `meta-data` carries nothing, cloud-init only needs it to exist
pub fn render_meta_data() -> String {
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_data_sets_login() {
        let doc = render_user_data("vm1", "alice", "secret");
        assert!(doc.starts_with("#cloud-config\nhostname: vm1\n"));
        assert!(doc.contains("  - name: alice\n"));
        assert!(doc.contains("    lock_passwd: false\n"));
        assert!(doc.contains("ssh_pwauth: true\n"));
        assert!(doc.contains("    alice:secret\n"));
        assert!(doc.ends_with("  expire: false\n"));
    }

    #[test]
    fn test_user_data_is_yaml() {
        let doc = render_user_data("vm1", "alice", "secret");
        let value: serde_yaml::Value = serde_yaml::from_str(&doc).unwrap();
        assert_eq!(value["hostname"].as_str(), Some("vm1"));
        assert_eq!(value["users"][0]["shell"].as_str(), Some("/bin/bash"));
        assert_eq!(value["chpasswd"]["list"].as_str(), Some("alice:secret\n"));
    }
}
