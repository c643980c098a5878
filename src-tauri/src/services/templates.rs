//! Command templates
//! Turns stored command strings with placeholders into literal shell commands
//! for a pod, and builds the standard ssh/scp commands.

use crate::models::PodRecord;

pub const IP: &str = "<ip>";
pub const PORT: &str = "<port>";
pub const LOCAL_PORT: &str = "<localPort>";
pub const SSH_URL: &str = "<sshUrl>";
pub const SSH_KEY_PATH: &str = "<sshKeyPath>";

/// Every placeholder the engine substitutes.
pub const PLACEHOLDERS: [&str; 5] = [IP, PORT, LOCAL_PORT, SSH_URL, SSH_KEY_PATH];

/// Remote port the tunnel forwards to unless told otherwise.
pub const DEFAULT_TUNNEL_REMOTE_PORT: u16 = 7860;

/// Replace every placeholder with the pod's values. Unknown `<tokens>` pass
/// through verbatim.
pub fn substitute(template: &str, pod: &PodRecord, ssh_key_path: &str) -> String {
    template
        .replace(IP, &pod.ip)
        .replace(PORT, &pod.port.to_string())
        .replace(LOCAL_PORT, &pod.local_port.to_string())
        .replace(SSH_URL, &pod.ssh_url)
        .replace(SSH_KEY_PATH, ssh_key_path)
}

/// Whether any known placeholder occurs in `template`.
pub fn has_variables(template: &str) -> bool {
    PLACEHOLDERS.iter().any(|p| template.contains(p))
}

/// Distinct placeholders present in `template`, in order of first appearance.
pub fn extract_variables(template: &str) -> Vec<&'static str> {
    let mut found: Vec<(usize, &'static str)> = PLACEHOLDERS
        .iter()
        .filter_map(|p| template.find(p).map(|at| (at, *p)))
        .collect();
    found.sort_by_key(|(at, _)| *at);
    found.into_iter().map(|(_, p)| p).collect()
}

/// `ssh <sshUrl> -i <sshKeyPath>`
pub fn build_ssh(pod: &PodRecord, ssh_key_path: &str) -> String {
    format!("ssh {} -i {}", pod.ssh_url, ssh_key_path)
}

/// `ssh -N -L <localPort>:127.0.0.1:<remote> -i <sshKeyPath> -p <port> root@<ip>`
pub fn build_tunnel(pod: &PodRecord, ssh_key_path: &str, remote_port: u16) -> String {
    format!(
        "ssh -N -L {}:127.0.0.1:{} -i {} -p {} root@{}",
        pod.local_port, remote_port, ssh_key_path, pod.port, pod.ip
    )
}

/// `scp -P <port> -i <sshKeyPath> "<localFile>" root@<ip>:<remoteTarget>`
pub fn build_upload(pod: &PodRecord, ssh_key_path: &str, local_file: &str, remote_target: &str) -> String {
    format!(
        "scp -P {} -i {} \"{}\" root@{}:{}",
        pod.port, ssh_key_path, local_file, pod.ip, remote_target
    )
}

/// `scp -P <port> -i <sshKeyPath> root@<ip>:<remoteFile> "<localTarget>"`
pub fn build_download(pod: &PodRecord, ssh_key_path: &str, remote_file: &str, local_target: &str) -> String {
    format!(
        "scp -P {} -i {} root@{}:{} \"{}\"",
        pod.port, ssh_key_path, pod.ip, remote_file, local_target
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod() -> PodRecord {
        PodRecord {
            ip: "1.2.3.4".to_string(),
            port: 22,
            local_port: 8080,
            ssh_url: "u@h".to_string(),
        }
    }

    #[test]
    fn substitutes_every_occurrence() {
        assert_eq!(
            substitute("<ip>:<port> key=<sshKeyPath>", &pod(), "/k"),
            "1.2.3.4:22 key=/k"
        );
        assert_eq!(
            substitute("ssh <sshUrl> -L <localPort>:x <ip> <ip>", &pod(), "/k"),
            "ssh u@h -L 8080:x 1.2.3.4 1.2.3.4"
        );
    }

    #[test]
    fn unknown_tokens_pass_through() {
        assert_eq!(
            substitute("cp <src> <ip>:<dest>", &pod(), "/k"),
            "cp <src> 1.2.3.4:<dest>"
        );
    }

    #[test]
    fn local_port_is_not_mistaken_for_port() {
        assert_eq!(substitute("<localPort>/<port>", &pod(), ""), "8080/22");
    }

    #[test]
    fn detects_known_placeholders_only() {
        assert!(!has_variables("echo hi"));
        assert!(has_variables("ssh <sshUrl>"));
        assert!(!has_variables("echo <name>"));
    }

    #[test]
    fn extracts_distinct_placeholders_in_order() {
        assert_eq!(
            extract_variables("scp -P <port> <ip>:/a <ip>:/b <other>"),
            vec!["<port>", "<ip>"]
        );
        assert!(extract_variables("ls -la").is_empty());
    }

    #[test]
    fn builds_tunnel_command() {
        let pod = PodRecord {
            ip: "1.2.3.4".to_string(),
            port: 15353,
            local_port: 7866,
            ssh_url: String::new(),
        };
        assert_eq!(
            build_tunnel(&pod, "/k", DEFAULT_TUNNEL_REMOTE_PORT),
            "ssh -N -L 7866:127.0.0.1:7860 -i /k -p 15353 root@1.2.3.4"
        );
    }

    #[test]
    fn builds_ssh_and_scp_commands() {
        assert_eq!(build_ssh(&pod(), "/k"), "ssh u@h -i /k");
        assert_eq!(
            build_upload(&pod(), "/k", "/tmp/my file.txt", "/workspace/"),
            "scp -P 22 -i /k \"/tmp/my file.txt\" root@1.2.3.4:/workspace/"
        );
        assert_eq!(
            build_download(&pod(), "/k", "/workspace/out.png", "/tmp/dl"),
            "scp -P 22 -i /k root@1.2.3.4:/workspace/out.png \"/tmp/dl\""
        );
    }
}
