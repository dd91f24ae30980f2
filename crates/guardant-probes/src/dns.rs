//! DNS record check (spec §4.2 "DNS").

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use guardant_proto::ServiceTypeConfig;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

pub struct DnsProbe;

const HARD_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
impl Probe for DnsProbe {
    async fn check(&self, target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let cfg = config.dns_config.clone().unwrap_or_default();
        let effective_deadline = deadline.min(HARD_TIMEOUT);
        let start = Instant::now();

        let resolver_ip = match IpAddr::from_str(&cfg.resolver) {
            Ok(ip) => ip,
            Err(_) => return ProbeOutcome::down(format!("Invalid resolver address: {}", cfg.resolver)),
        };
        let record_type = match cfg.record_type.to_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::AAAA,
            "CNAME" => RecordType::CNAME,
            "MX" => RecordType::MX,
            "TXT" => RecordType::TXT,
            "NS" => RecordType::NS,
            other => return ProbeOutcome::down(format!("Unsupported DNS record type: {other}")),
        };

        let mut opts = ResolverOpts::default();
        opts.timeout = effective_deadline;
        let resolver_cfg = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from_ips_clear(&[resolver_ip], 53, true),
        );
        let resolver = TokioAsyncResolver::tokio(resolver_cfg, opts);

        let lookup = tokio::time::timeout(effective_deadline, resolver.lookup(target, record_type)).await;
        let lookup = match lookup {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("DNS lookup failed: {e}")),
            Ok(Ok(l)) => l,
        };

        let values: Vec<String> = lookup.record_iter().filter_map(rdata_to_string).collect();
        if values.is_empty() {
            return ProbeOutcome::down(format!("No {} records found", cfg.record_type));
        }

        if let Some(expected) = &cfg.expected_value {
            let matched = values.iter().any(|v| v == expected || v.trim_end_matches('.') == expected.trim_end_matches('.'));
            if !matched {
                return ProbeOutcome::down(format!(
                    "No {} record matched expected value '{expected}' (got {values:?})",
                    cfg.record_type
                ));
            }
        }

        ProbeOutcome::up(
            format!("Resolved {} record(s): {}", cfg.record_type, values.join(", ")),
            Some(crate::elapsed_ms(start)),
        )
    }
}

fn rdata_to_string(record: &hickory_resolver::proto::rr::Record) -> Option<String> {
    record.data().map(|rdata| match rdata {
        RData::A(ip) => ip.to_string(),
        RData::AAAA(ip) => ip.to_string(),
        RData::CNAME(name) => name.to_string(),
        RData::MX(mx) => mx.exchange().to_string(),
        RData::TXT(txt) => txt.to_string(),
        RData::NS(ns) => ns.to_string(),
        other => format!("{other:?}"),
    })
}
