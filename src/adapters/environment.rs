//! Provider Detection
//!
//! Holds the wallet objects the host environment injects (`ethereum`,
//! `okxwallet`) together with the user agent used to tell mobile browsers
//! and the OKX in-app browser apart.

use std::fmt;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::http_provider::HttpWalletProvider;
use crate::config::WalletSection;
use crate::domain::connection::ProviderSource;
use crate::ports::wallet::{ProviderError, WalletProvider};

/// OKX app deep link prefix; the dapp URL is appended percent-encoded
pub const OKX_DEEP_LINK_PREFIX: &str = "okx://wallet/dapp/details?dappUrl=";

/// Where users without the OKX app are sent
pub const OKX_DOWNLOAD_URL: &str = "https://www.okx.com/download";

const MOBILE_MARKERS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Snapshot of the injected providers and device characteristics
#[derive(Clone, Default)]
pub struct Environment {
    ethereum: Option<Arc<dyn WalletProvider>>,
    okxwallet: Option<Arc<dyn WalletProvider>>,
    user_agent: String,
    dapp_url: String,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("ethereum", &self.ethereum.as_ref().map(|p| p.name().to_string()))
            .field("okxwallet", &self.okxwallet.as_ref().map(|p| p.name().to_string()))
            .field("user_agent", &self.user_agent)
            .field("dapp_url", &self.dapp_url)
            .finish()
    }
}

impl Environment {
    pub fn new(user_agent: impl Into<String>, dapp_url: impl Into<String>) -> Self {
        Self {
            ethereum: None,
            okxwallet: None,
            user_agent: user_agent.into(),
            dapp_url: dapp_url.into(),
        }
    }

    pub fn with_ethereum(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.ethereum = Some(provider);
        self
    }

    pub fn with_okxwallet(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.okxwallet = Some(provider);
        self
    }

    /// Build from the `[wallet]` config section.
    ///
    /// Returns the HTTP providers as well so the caller can start their
    /// event watchers.
    pub fn from_config(
        wallet: &WalletSection,
    ) -> Result<(Self, Vec<Arc<HttpWalletProvider>>), ProviderError> {
        let mut env = Self::new(wallet.user_agent.clone(), wallet.dapp_url.clone());
        let mut http = Vec::new();

        if let Some(url) = wallet.get_ethereum_url() {
            let provider = Arc::new(HttpWalletProvider::new("ethereum", url)?);
            env.ethereum = Some(provider.clone());
            http.push(provider);
        }

        if let Some(url) = wallet.get_okx_url() {
            let provider = Arc::new(HttpWalletProvider::new("okxwallet", url)?);
            env.okxwallet = Some(provider.clone());
            http.push(provider);
        }

        tracing::debug!("Detected environment: {:?}", env);
        Ok((env, http))
    }

    /// Injected provider for `source`, if present
    pub fn provider(&self, source: ProviderSource) -> Option<Arc<dyn WalletProvider>> {
        match source {
            ProviderSource::Ethereum => self.ethereum.clone(),
            ProviderSource::OkxWallet => self.okxwallet.clone(),
        }
    }

    pub fn has_provider(&self, source: ProviderSource) -> bool {
        match source {
            ProviderSource::Ethereum => self.ethereum.is_some(),
            ProviderSource::OkxWallet => self.okxwallet.is_some(),
        }
    }

    /// Present sources, OKX first
    pub fn present_sources(&self) -> Vec<ProviderSource> {
        [ProviderSource::OkxWallet, ProviderSource::Ethereum]
            .into_iter()
            .filter(|s| self.has_provider(*s))
            .collect()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn dapp_url(&self) -> &str {
        &self.dapp_url
    }

    pub fn is_mobile(&self) -> bool {
        is_mobile_user_agent(&self.user_agent)
    }

    pub fn is_in_okx_app(&self) -> bool {
        is_okx_user_agent(&self.user_agent)
    }

    /// Deep link opening this dapp inside the OKX app
    pub fn okx_deep_link(&self) -> String {
        format!("{}{}", OKX_DEEP_LINK_PREFIX, encode_uri_component(&self.dapp_url))
    }
}

pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    MOBILE_MARKERS.iter().any(|marker| ua.contains(marker))
}

pub fn is_okx_user_agent(user_agent: &str) -> bool {
    user_agent.to_ascii_lowercase().contains("okx")
}

/// Characters `encodeURIComponent` leaves alone: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::MockWalletProvider;

    const IPHONE_UA: &str =
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0";

    #[test]
    fn test_mobile_detection() {
        assert!(is_mobile_user_agent(IPHONE_UA));
        assert!(is_mobile_user_agent("Opera/9.80 (J2ME/MIDP; Opera Mini/9.80)"));
        assert!(is_mobile_user_agent("Mozilla/5.0 (Linux; ANDROID 14)"));
        assert!(!is_mobile_user_agent(DESKTOP_UA));
    }

    #[test]
    fn test_okx_app_detection() {
        assert!(is_okx_user_agent("Mozilla/5.0 (iPhone) OKApp/6.0 OKX/6.0"));
        assert!(!is_okx_user_agent(IPHONE_UA));
    }

    #[test]
    fn test_encode_uri_component() {
        assert_eq!(
            encode_uri_component("https://home.saigo.dev/exchange?a=1&b=two words"),
            "https%3A%2F%2Fhome.saigo.dev%2Fexchange%3Fa%3D1%26b%3Dtwo%20words"
        );
        assert_eq!(encode_uri_component("it's(ok)!*~"), "it's(ok)!*~");
        assert_eq!(encode_uri_component("é"), "%C3%A9");
    }

    #[test]
    fn test_deep_link() {
        let env = Environment::new(IPHONE_UA, "https://home.saigo.dev/");
        assert_eq!(
            env.okx_deep_link(),
            "okx://wallet/dapp/details?dappUrl=https%3A%2F%2Fhome.saigo.dev%2F"
        );
    }

    #[test]
    fn test_present_sources_okx_first() {
        let env = Environment::new(DESKTOP_UA, "")
            .with_ethereum(Arc::new(MockWalletProvider::new("ethereum")))
            .with_okxwallet(Arc::new(MockWalletProvider::new("okxwallet")));
        assert_eq!(
            env.present_sources(),
            vec![ProviderSource::OkxWallet, ProviderSource::Ethereum]
        );
        assert_eq!(env.provider(ProviderSource::Ethereum).unwrap().name(), "ethereum");

        let empty = Environment::new(DESKTOP_UA, "");
        assert!(empty.present_sources().is_empty());
        assert!(empty.provider(ProviderSource::OkxWallet).is_none());
    }

    #[test]
    fn test_from_config() {
        let wallet = WalletSection {
            ethereum_url: Some("http://127.0.0.1:8545".to_string()),
            okx_url: Some("  ".to_string()),
            ..WalletSection::default()
        };
        // env overrides are not set in tests
        if std::env::var("SAIGO_OKX_URL").is_ok() || std::env::var("SAIGO_ETHEREUM_URL").is_ok() {
            return;
        }
        let (env, http) = Environment::from_config(&wallet).unwrap();
        assert!(env.has_provider(ProviderSource::Ethereum));
        assert!(!env.has_provider(ProviderSource::OkxWallet));
        assert_eq!(http.len(), 1);
    }
}
