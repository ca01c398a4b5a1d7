use super::connector;
use crate::model::{CipherSuite, ProtocolVersion};
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct SuiteInfo {
    pub id: CipherSuite,
    /// IANA name.
    pub name: &'static str,
    /// Name OpenSSL uses in cipher strings and reports after a handshake.
    pub openssl_name: &'static str,
    pub insecure: bool,
}

const fn suite(
    id: u16,
    name: &'static str,
    openssl_name: &'static str,
    insecure: bool,
) -> SuiteInfo {
    SuiteInfo {
        id: CipherSuite(id),
        name,
        openssl_name,
        insecure,
    }
}

static VERSIONS: [ProtocolVersion; 4] = [
    ProtocolVersion::TLS1_0,
    ProtocolVersion::TLS1_1,
    ProtocolVersion::TLS1_2,
    ProtocolVersion::TLS1_3,
];

// Secure suites first, then legacy ones. TLS 1.3 suites are absent because
// cipher probes are pinned to TLS 1.2.
#[rustfmt::skip]
static SUITES: &[SuiteInfo] = &[
    suite(0xc009, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", "ECDHE-ECDSA-AES128-SHA", false),
    suite(0xc00a, "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", "ECDHE-ECDSA-AES256-SHA", false),
    suite(0xc013, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", "ECDHE-RSA-AES128-SHA", false),
    suite(0xc014, "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", "ECDHE-RSA-AES256-SHA", false),
    suite(0xc02b, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", "ECDHE-ECDSA-AES128-GCM-SHA256", false),
    suite(0xc02c, "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", "ECDHE-ECDSA-AES256-GCM-SHA384", false),
    suite(0xc02f, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", "ECDHE-RSA-AES128-GCM-SHA256", false),
    suite(0xc030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", "ECDHE-RSA-AES256-GCM-SHA384", false),
    suite(0xcca8, "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", "ECDHE-RSA-CHACHA20-POLY1305", false),
    suite(0xcca9, "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", "ECDHE-ECDSA-CHACHA20-POLY1305", false),
    suite(0x0005, "TLS_RSA_WITH_RC4_128_SHA", "RC4-SHA", true),
    suite(0x000a, "TLS_RSA_WITH_3DES_EDE_CBC_SHA", "DES-CBC3-SHA", true),
    suite(0x002f, "TLS_RSA_WITH_AES_128_CBC_SHA", "AES128-SHA", true),
    suite(0x0035, "TLS_RSA_WITH_AES_256_CBC_SHA", "AES256-SHA", true),
    suite(0x003c, "TLS_RSA_WITH_AES_128_CBC_SHA256", "AES128-SHA256", true),
    suite(0x009c, "TLS_RSA_WITH_AES_128_GCM_SHA256", "AES128-GCM-SHA256", true),
    suite(0x009d, "TLS_RSA_WITH_AES_256_GCM_SHA384", "AES256-GCM-SHA384", true),
    suite(0xc007, "TLS_ECDHE_ECDSA_WITH_RC4_128_SHA", "ECDHE-ECDSA-RC4-SHA", true),
    suite(0xc011, "TLS_ECDHE_RSA_WITH_RC4_128_SHA", "ECDHE-RSA-RC4-SHA", true),
    suite(0xc012, "TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA", "ECDHE-RSA-DES-CBC3-SHA", true),
    suite(0xc023, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256", "ECDHE-ECDSA-AES128-SHA256", true),
    suite(0xc027, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256", "ECDHE-RSA-AES128-SHA256", true),
];

/// Protocol versions from oldest to newest.
pub fn protocol_versions() -> &'static [ProtocolVersion] {
    &VERSIONS
}

/// Every TLS 1.2 suite the local connector can offer, secure and insecure
/// alike, in table order. Suites the OpenSSL build refuses to put in a hello
/// are left out rather than attempted.
pub fn cipher_suites() -> &'static [CipherSuite] {
    static OFFERED: OnceLock<Vec<CipherSuite>> = OnceLock::new();

    OFFERED.get_or_init(|| {
        SUITES
            .iter()
            .filter(|info| {
                let offered = connector::can_offer(info.openssl_name);
                if !offered {
                    debug!(suite = info.name, "local library cannot offer suite, skipping");
                }
                offered
            })
            .map(|info| info.id)
            .collect()
    })
}

pub fn suite_info(id: CipherSuite) -> Option<&'static SuiteInfo> {
    SUITES.iter().find(|info| info.id == id)
}

pub fn suite_by_openssl_name(name: &str) -> Option<&'static SuiteInfo> {
    SUITES
        .iter()
        .find(|info| info.openssl_name.eq_ignore_ascii_case(name))
}
