//! Operator-supplied custom matrix entries.

use crate::{
    entity::FlowRecord,
    error::{DecodeError, Error},
};
use std::{fmt, path::Path, str::FromStr};

/// Encoding of matrix files, both custom entry inputs and matrix outputs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Csv,
}

// === impl Format ===

impl FromStr for Format {
    type Err = Error;

    /// Case-sensitive match against the recognized tokens. Rejected before
    /// any file I/O happens.
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            "csv" => Ok(Self::Csv),
            s => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Csv => "csv",
        })
    }
}

/// Loads custom entries from `path` under the given encoding.
///
/// The whole load aborts on the first failure; there are no partial results.
pub fn load(path: impl AsRef<Path>, format: Format) -> Result<Vec<FlowRecord>, Error> {
    let path = path.as_ref();
    let raw = std::fs::read(path).map_err(|source| Error::FileAccess {
        path: path.display().to_string(),
        source,
    })?;
    decode(&raw, format)
}

fn decode(raw: &[u8], format: Format) -> Result<Vec<FlowRecord>, Error> {
    let decoded = match format {
        Format::Json => serde_json::from_slice(raw).map_err(DecodeError::from),
        Format::Yaml => serde_yaml::from_slice(raw).map_err(DecodeError::from),
        Format::Csv => csv::Reader::from_reader(raw)
            .deserialize()
            .collect::<Result<Vec<FlowRecord>, _>>()
            .map_err(DecodeError::from),
    };
    decoded.map_err(|source| Error::Decode { format, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{NodeRole, Protocol};

    #[test]
    fn unrecognized_tokens_fail_before_io() {
        assert!(matches!(
            "xml".parse::<Format>(),
            Err(Error::UnsupportedFormat(token)) if token == "xml"
        ));
        assert!("JSON".parse::<Format>().is_err(), "tokens are case-sensitive");
        assert!("".parse::<Format>().is_err());
    }

    #[test]
    fn missing_file_is_a_file_access_error() {
        let result = load("/nonexistent/custom-entries.json", Format::Json);
        assert!(matches!(result, Err(Error::FileAccess { .. })));
    }

    #[test]
    fn decodes_json() {
        let raw = br#"[
            {
                "direction": "Ingress",
                "protocol": "TCP",
                "port": 9200,
                "namespace": "logging",
                "service": "elasticsearch",
                "pod": "",
                "container": "",
                "nodeRole": "worker",
                "optional": true
            }
        ]"#;

        let entries = decode(raw, Format::Json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].protocol, Protocol::Tcp);
        assert_eq!(entries[0].port, 9200);
        assert_eq!(entries[0].node_role, NodeRole::Worker);
        assert!(entries[0].optional);
    }

    #[test]
    fn decodes_yaml() {
        let raw = b"\
- direction: Ingress
  protocol: UDP
  port: 9000
  service: custom-udp
  nodeRole: master
";

        let entries = decode(raw, Format::Yaml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].protocol, Protocol::Udp);
        assert_eq!(entries[0].namespace, "", "omitted fields default to empty");
        assert!(!entries[0].optional);
    }

    #[test]
    fn decodes_csv() {
        let raw = b"\
direction,protocol,port,namespace,service,pod,container,nodeRole,optional
Ingress,TCP,8080,default,custom-http,,,worker,false
Ingress,UDP,514,logging,syslog,,,master,true
";

        let entries = decode(raw, Format::Csv).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].service, "custom-http");
        assert_eq!(entries[1].port, 514);
        assert!(entries[1].optional);
    }

    #[test]
    fn malformed_input_aborts_the_load() {
        assert!(matches!(
            decode(b"not json", Format::Json),
            Err(Error::Decode { format: Format::Json, .. })
        ));
        assert!(matches!(
            decode(b"direction,protocol\nIngress", Format::Csv),
            Err(Error::Decode { format: Format::Csv, .. })
        ));
    }
}
