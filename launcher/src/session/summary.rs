use colored::Colorize;
use flow::NetworkMode;

/// Block explorer pages for the admin account. The emulator has none.
pub fn explorer_links(network: NetworkMode, admin: &str) -> Vec<(&'static str, String)> {
    match network {
        NetworkMode::Emulator => Vec::new(),
        NetworkMode::Testnet => vec![
            (
                "View your account and transactions here:",
                format!("https://testnet.flowscan.org/account/{admin}"),
            ),
            (
                "Explore your account here:",
                format!("https://flow-view-source.com/{network}/account/{admin}"),
            ),
        ],
    }
}

/// Closing message printed once every service is up
pub fn render(network: NetworkMode, web_url: &str, admin: Option<&str>) -> String {
    let mut out = format!(
        "\n{}\n\n{}: {}\n\n",
        "KITTY ITEMS HAS STARTED".bright_magenta().bold(),
        "Visit".bright_cyan(),
        web_url
    );

    if let Some(admin) = admin {
        for (title, url) in explorer_links(network, admin) {
            out.push_str(&format!("{}\n{}\n\n", title.bright_cyan(), url));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emulator_has_no_explorer_links() {
        assert!(explorer_links(NetworkMode::Emulator, "f8d6e0586b0a20c7").is_empty());

        let summary = render(NetworkMode::Emulator, "http://localhost:3001", Some("f8d6e0586b0a20c7"));
        assert!(summary.contains("http://localhost:3001"));
        assert!(!summary.contains("flowscan"));
    }

    #[test]
    fn test_testnet_explorer_links() {
        let links = explorer_links(NetworkMode::Testnet, "0x01cf0e2f2f715450");
        let urls: Vec<_> = links.iter().map(|(_, url)| url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://testnet.flowscan.org/account/0x01cf0e2f2f715450",
                "https://flow-view-source.com/testnet/account/0x01cf0e2f2f715450",
            ]
        );
    }
}
