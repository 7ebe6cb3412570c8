//! URL Canonicalizer.

use url::Url;

/// Query parameters stripped from every canonicalized URL.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "gclsrc",
    "dclid",
    "gbraid",
    "wbraid",
    "msclkid",
    "twclid",
    "igshid",
    "mc_cid",
    "mc_eid",
    "_openstat",
    "vero_id",
    "wickedid",
    "yclid",
    "rb_clickid",
    "s_cid",
    "mkt_tok",
    "trk",
    "trkCampaign",
    "trkInfo",
    "oly_anon_id",
    "oly_enc_id",
];

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid URL: {0}")]
pub struct InvalidUrl(pub String);

/// Lowercase scheme and host, force `https`, strip a leading `www.` label,
/// drop the fragment, sort query params lexicographically, remove known
/// tracking params, preserve trailing slash and non-default port.
///
/// Idempotent: `canonicalize(canonicalize(u)) == canonicalize(u)` for every
/// input that does not fail.
pub fn canonicalize(input: &str) -> Result<String, InvalidUrl> {
    let mut url = Url::parse(input).map_err(|e| InvalidUrl(e.to_string()))?;

    if url.host_str().is_none() {
        return Err(InvalidUrl(format!("no host in {input}")));
    }

    url.set_scheme("https")
        .map_err(|_| InvalidUrl(format!("cannot force https scheme on {input}")))?;

    let host = url.host_str().unwrap().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| InvalidUrl(e.to_string()))?;

    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.iter().any(|t| t.eq_ignore_ascii_case(k)))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0));

    if params.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &params {
            serializer.append_pair(k, v);
        }
        url.set_query(Some(&serializer.finish()));
    }

    Ok(url.to_string())
}

/// Host of the canonicalized form.
pub fn extract_domain(input: &str) -> Result<String, InvalidUrl> {
    let canonical = canonicalize(input)?;
    let url = Url::parse(&canonical).map_err(|e| InvalidUrl(e.to_string()))?;
    url.host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| InvalidUrl(format!("no host in {input}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params_and_sorts_remaining() {
        let out =
            canonicalize("http://WWW.Example.COM/a?utm_source=x&b=2&a=1#frag").unwrap();
        assert_eq!(out, "https://example.com/a?a=1&b=2");
    }

    #[test]
    fn extracts_domain_without_www() {
        let domain = extract_domain("https://www.bbc.co.uk/news").unwrap();
        assert_eq!(domain, "bbc.co.uk");
    }

    #[test]
    fn is_idempotent() {
        let inputs = [
            "http://WWW.Example.COM/a?utm_source=x&b=2&a=1#frag",
            "https://example.com/",
            "https://example.com:8443/path/?z=1&a=2",
        ];
        for input in inputs {
            let once = canonicalize(input).unwrap();
            let twice = canonicalize(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn preserves_non_default_port() {
        let out = canonicalize("https://example.com:8443/path").unwrap();
        assert!(out.starts_with("https://example.com:8443/"));
    }

    #[test]
    fn preserves_trailing_slash() {
        let out = canonicalize("https://example.com/path/").unwrap();
        assert!(out.ends_with('/'));
    }

    #[test]
    fn rejects_missing_host() {
        assert!(canonicalize("not a url").is_err());
    }
}
