//! Building the domain set of an order.
//!
//! The primary domain always comes first (it becomes the CSR common name),
//! followed by the other domains in the order they were given. Entries are
//! trimmed, blank lines are dropped and duplicates are removed
//! case-insensitively, keeping the first occurrence.

/// Normalizes a newline delimited list of other domains, dropping the
/// primary domain if it is repeated there.
pub fn split_other_domains(primary: &str, other_domains: &str) -> Vec<String> {
  let mut seen = vec![primary.trim().to_ascii_lowercase()];
  distinct(&mut seen, other_domains.lines())
}

/// Normalizes a domain list given as separate entries, e.g. the domains of
/// a manual DNS lookup.
pub fn normalize_domains<'a, I>(domains: I) -> Vec<String>
where
  I: IntoIterator<Item = &'a str>,
{
  distinct(&mut vec![], domains)
}

fn distinct<'a, I>(seen: &mut Vec<String>, candidates: I) -> Vec<String>
where
  I: IntoIterator<Item = &'a str>,
{
  let mut domains = vec![];
  for domain in candidates.into_iter().map(str::trim) {
    if domain.is_empty() {
      continue;
    }
    let key = domain.to_ascii_lowercase();
    if seen.contains(&key) {
      continue;
    }
    seen.push(key);
    domains.push(domain.to_string());
  }
  domains
}

/// The full ordered domain set passed to the CA.
pub fn combine_domains(primary: &str, other_domains: &str) -> Vec<String> {
  let mut domains = vec![primary.trim().to_string()];
  domains.extend(split_other_domains(primary, other_domains));
  domains
}
