use crate::crds::{DOMAIN_LABEL_KEY, TOKEN_LABEL_KEY};
use adler2::Adler32;

/// Adler-32 of `input` as an unsigned decimal string, the form cert-manager uses for
/// its solver service labels.
pub fn hash(input: &str) -> String {
    let mut adler = Adler32::new();
    adler.write_slice(input.as_bytes());
    adler.checksum().to_string()
}

/// Label selector matching the solver service cert-manager created for this host and token
pub fn solver_selector(dns_name: &str, token: &str) -> String {
    format!(
        "{}={},{}={}",
        DOMAIN_LABEL_KEY,
        hash(dns_name),
        TOKEN_LABEL_KEY,
        hash(token)
    )
}
