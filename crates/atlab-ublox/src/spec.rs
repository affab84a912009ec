//! Per-family AT command templates.
//!
//! A [`DeviceSpec`] is an immutable set of optional command templates, one
//! per [`Intent`]. A missing template means the family does not support the
//! intent; that is only an error when the intent is invoked.
//!
//! Templates use named placeholders such as `{socket}` or `{apn}`. A
//! literal brace is written `{{` or `}}`. Each intent accepts a fixed set
//! of placeholder names (see [`Intent::placeholders`]); anything else is a
//! configuration error, caught by [`DeviceSpec::validate`] when a spec file
//! is loaded.

use std::fmt::{self, Display, Write};
use std::path::Path;

use serde::Deserialize;

use atlab_core::error::{Error, Result};

/// One high-level operation a family may implement with a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Reboot,
    FirmwareVersion,
    Radio,
    ConfigApn,
    AutoOperatorSelection,
    RegistrationStatus,
    PowerSaveMode,
    DisableEdrx,
    CreateUdpSocket,
    CreateTcpSocket,
    CloseSocket,
    SendDatagram,
    ReceiveDatagram,
}

impl Intent {
    pub const ALL: [Intent; 13] = [
        Intent::Reboot,
        Intent::FirmwareVersion,
        Intent::Radio,
        Intent::ConfigApn,
        Intent::AutoOperatorSelection,
        Intent::RegistrationStatus,
        Intent::PowerSaveMode,
        Intent::DisableEdrx,
        Intent::CreateUdpSocket,
        Intent::CreateTcpSocket,
        Intent::CloseSocket,
        Intent::SendDatagram,
        Intent::ReceiveDatagram,
    ];

    /// The key naming this template in a spec file.
    pub fn key(&self) -> &'static str {
        match self {
            Intent::Reboot => "reboot",
            Intent::FirmwareVersion => "firmware_version",
            Intent::Radio => "radio",
            Intent::ConfigApn => "config_apn",
            Intent::AutoOperatorSelection => "auto_operator_selection",
            Intent::RegistrationStatus => "registration_status",
            Intent::PowerSaveMode => "psm",
            Intent::DisableEdrx => "disable_edrx",
            Intent::CreateUdpSocket => "create_udp_socket",
            Intent::CreateTcpSocket => "create_tcp_socket",
            Intent::CloseSocket => "close_socket",
            Intent::SendDatagram => "send_datagram",
            Intent::ReceiveDatagram => "receive_datagram",
        }
    }

    /// Placeholder names the template for this intent may use.
    pub fn placeholders(&self) -> &'static [&'static str] {
        match self {
            Intent::Reboot
            | Intent::FirmwareVersion
            | Intent::AutoOperatorSelection
            | Intent::RegistrationStatus
            | Intent::DisableEdrx => &[],
            Intent::Radio => &["state"],
            Intent::ConfigApn => &["apn"],
            Intent::PowerSaveMode => &["enabled", "periodic_timer", "active_time"],
            Intent::CreateUdpSocket | Intent::CreateTcpSocket => &["port"],
            Intent::CloseSocket => &["socket"],
            Intent::SendDatagram => &[
                "socket", "ip", "port", "flag", "flag_hex", "length", "payload",
            ],
            Intent::ReceiveDatagram => &["socket", "length"],
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Command templates for one module family.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSpec {
    /// Family name, e.g. "SARA-N2".
    pub name: String,
    /// Factory baud rate of the module's AT port.
    pub baud_rate: u32,
    #[serde(default)]
    pub reboot: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub radio: Option<String>,
    #[serde(default)]
    pub config_apn: Option<String>,
    #[serde(default)]
    pub auto_operator_selection: Option<String>,
    #[serde(default)]
    pub registration_status: Option<String>,
    #[serde(default)]
    pub psm: Option<String>,
    #[serde(default)]
    pub disable_edrx: Option<String>,
    #[serde(default)]
    pub create_udp_socket: Option<String>,
    #[serde(default)]
    pub create_tcp_socket: Option<String>,
    #[serde(default)]
    pub close_socket: Option<String>,
    #[serde(default)]
    pub send_datagram: Option<String>,
    #[serde(default)]
    pub receive_datagram: Option<String>,
    /// Prefix of the notification announcing inbound data, e.g. `+NSONMI`.
    #[serde(default)]
    pub received_message_indication: Option<String>,
}

impl DeviceSpec {
    /// An empty spec: every intent unsupported.
    pub fn new(name: &str, baud_rate: u32) -> Self {
        DeviceSpec {
            name: name.to_string(),
            baud_rate,
            reboot: None,
            firmware_version: None,
            radio: None,
            config_apn: None,
            auto_operator_selection: None,
            registration_status: None,
            psm: None,
            disable_edrx: None,
            create_udp_socket: None,
            create_tcp_socket: None,
            close_socket: None,
            send_datagram: None,
            receive_datagram: None,
            received_message_indication: None,
        }
    }

    /// The template for `intent`, if this family has one.
    ///
    /// Blank templates count as absent.
    pub fn template(&self, intent: Intent) -> Option<&str> {
        let slot = match intent {
            Intent::Reboot => &self.reboot,
            Intent::FirmwareVersion => &self.firmware_version,
            Intent::Radio => &self.radio,
            Intent::ConfigApn => &self.config_apn,
            Intent::AutoOperatorSelection => &self.auto_operator_selection,
            Intent::RegistrationStatus => &self.registration_status,
            Intent::PowerSaveMode => &self.psm,
            Intent::DisableEdrx => &self.disable_edrx,
            Intent::CreateUdpSocket => &self.create_udp_socket,
            Intent::CreateTcpSocket => &self.create_tcp_socket,
            Intent::CloseSocket => &self.close_socket,
            Intent::SendDatagram => &self.send_datagram,
            Intent::ReceiveDatagram => &self.receive_datagram,
        };
        slot.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Like [`template`](Self::template), but a missing template is an
    /// [`Error::Unsupported`].
    pub fn require(&self, intent: Intent) -> Result<&str> {
        self.template(intent).ok_or_else(|| {
            Error::Unsupported(format!("{} has no {} template", self.name, intent))
        })
    }

    /// Prefix of the inbound-data notification, if the family sends one.
    pub fn indication_prefix(&self) -> Option<&str> {
        self.received_message_indication
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }

    /// Intents this family has templates for.
    pub fn supported(&self) -> Vec<Intent> {
        Intent::ALL
            .into_iter()
            .filter(|i| self.template(*i).is_some())
            .collect()
    }

    /// Check every present template against its intent's placeholder set.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Configuration("device spec name is empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(Error::Configuration(format!(
                "{}: baud_rate must be positive",
                self.name
            )));
        }
        for intent in Intent::ALL {
            if let Some(template) = self.template(intent) {
                let params: Vec<(&str, &(dyn Display + Sync))> = intent
                    .placeholders()
                    .iter()
                    .map(|name| (*name, &0 as &(dyn Display + Sync)))
                    .collect();
                render(template, &params).map_err(|e| {
                    Error::Configuration(format!("{}: {} template: {}", self.name, intent, e))
                })?;
            }
        }
        Ok(())
    }

    /// Parse and validate a spec from TOML text.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let spec: DeviceSpec = toml::from_str(input)
            .map_err(|e| Error::Configuration(format!("invalid device spec TOML: {}", e)))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Read, parse, and validate a spec file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read device spec {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }
}

/// Substitute `{name}` placeholders in `template`.
///
/// `{{` and `}}` produce literal braces. A placeholder not listed in
/// `params`, or an unbalanced brace, is an [`Error::Configuration`].
pub fn render(
    template: &str,
    params: &[(&str, &(dyn Display + Sync))],
) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let start = pos + 1;
                let end = loop {
                    match chars.next() {
                        Some((i, '}')) => break i,
                        Some((_, '{')) | None => {
                            return Err(Error::Configuration(format!(
                                "unbalanced '{{' at offset {} in {:?}",
                                pos, template
                            )))
                        }
                        Some(_) => {}
                    }
                };
                let name = &template[start..end];
                let (_, value) = params.iter().find(|(key, _)| *key == name).ok_or_else(|| {
                    Error::Configuration(format!(
                        "unknown placeholder {{{}}} in {:?}",
                        name, template
                    ))
                })?;
                // Writing to a String cannot fail.
                let _ = write!(out, "{}", value);
            }
            '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(Error::Configuration(format!(
                    "unbalanced '}}' at offset {} in {:?}",
                    pos, template
                )))
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn render_substitutes_named_values() {
        let out = render("AT+CFUN={state}", &[("state", &"1")]).unwrap();
        assert_eq!(out, "AT+CFUN=1");
    }

    #[test]
    fn render_repeated_and_reordered() {
        let out = render(
            "{b}-{a}-{b}",
            &[("a", &1), ("b", &"x")],
        )
        .unwrap();
        assert_eq!(out, "x-1-x");
    }

    #[test]
    fn render_escaped_braces() {
        let out = render("{{{socket}}}", &[("socket", &7)]).unwrap();
        assert_eq!(out, "{7}");
    }

    #[test]
    fn render_unknown_placeholder_is_configuration_error() {
        let err = render("AT+X={nope}", &[("state", &1)]).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("{nope}"));
    }

    #[test]
    fn render_unbalanced_braces() {
        assert!(render("AT+X={state", &[("state", &1)])
            .unwrap_err()
            .is_configuration());
        assert!(render("AT+X=state}", &[]).unwrap_err().is_configuration());
        assert!(render("AT+X={a{b}}", &[("b", &1)])
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn render_quotes_pass_through() {
        let out = render(r#"AT+CGDCONT=0,"IP","{apn}""#, &[("apn", &"telia.iot")]).unwrap();
        assert_eq!(out, r#"AT+CGDCONT=0,"IP","telia.iot""#);
    }

    #[test]
    fn blank_template_counts_as_missing() {
        let mut spec = DeviceSpec::new("X", 9600);
        spec.reboot = Some("   ".into());
        assert_eq!(spec.template(Intent::Reboot), None);
        let err = spec.require(Intent::Reboot).unwrap_err();
        assert!(matches!(err, Error::Unsupported(ref m) if m == "X has no reboot template"));
    }

    #[test]
    fn supported_lists_present_templates() {
        let mut spec = DeviceSpec::new("X", 9600);
        spec.reboot = Some("AT+NRB".into());
        spec.close_socket = Some("AT+NSOCL={socket}".into());
        assert_eq!(spec.supported(), vec![Intent::Reboot, Intent::CloseSocket]);
    }

    #[test]
    fn toml_minimal_spec() {
        let spec = DeviceSpec::from_toml_str(
            r#"
            name = "BG96"
            baud_rate = 115200
            reboot = "AT+CFUN=1,1"
            registration_status = "AT+CEREG?"
            "#,
        )
        .unwrap();
        assert_eq!(spec.name, "BG96");
        assert_eq!(spec.baud_rate, 115_200);
        assert_eq!(spec.template(Intent::Reboot), Some("AT+CFUN=1,1"));
        assert_eq!(spec.template(Intent::Radio), None);
        assert_eq!(spec.indication_prefix(), None);
    }

    #[test]
    fn toml_requires_name_and_baud() {
        let err = DeviceSpec::from_toml_str(r#"name = "X""#).unwrap_err();
        assert!(err.is_configuration());
        let err = DeviceSpec::from_toml_str("baud_rate = 9600").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let err = DeviceSpec::from_toml_str(
            r#"
            name = "X"
            baud_rate = 9600
            rebot = "AT+NRB"
            "#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn toml_rejects_foreign_placeholder() {
        let err = DeviceSpec::from_toml_str(
            r#"
            name = "X"
            baud_rate = 9600
            close_socket = "AT+NSOCL={port}"
            "#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("close_socket"));
    }

    #[test]
    fn zero_baud_is_rejected() {
        let err = DeviceSpec::from_toml_str(
            r#"
            name = "X"
            baud_rate = 0
            "#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
name = "SARA-R5"
baud_rate = 115200
create_udp_socket = "AT+USOCR=17,{{port}}"
received_message_indication = "+UUSORF"
"#
        )
        .unwrap();

        let spec = DeviceSpec::from_file(file.path()).unwrap();
        assert_eq!(spec.name, "SARA-R5");
        assert_eq!(
            spec.template(Intent::CreateUdpSocket),
            Some("AT+USOCR=17,{port}")
        );
        assert_eq!(spec.indication_prefix(), Some("+UUSORF"));
    }

    #[test]
    fn from_file_missing_is_configuration_error() {
        let err = DeviceSpec::from_file(Path::new("/nonexistent/atlab/spec.toml")).unwrap_err();
        assert!(err.is_configuration());
    }
}
