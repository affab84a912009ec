//! Built-in u-blox SARA family definitions.
//!
//! | Family  | Alias | Baud   | Radio | Registration | TCP | Receive |
//! |---------|-------|--------|-------|--------------|-----|---------|
//! | SARA-N2 | `n2`  | 9600   | yes   | yes          | no  | yes     |
//! | SARA-R4 | `r4`  | 115200 | no    | no           | yes | no      |
//!
//! The N2 is an NB-IoT-only module with the `+NSO*` socket command set. The
//! R4 reboots through `AT+CFUN=15`, opens sockets with `+USOCR`, and
//! reports the handle as a notification.

use crate::spec::DeviceSpec;

fn template(s: &str) -> Option<String> {
    Some(s.to_string())
}

/// Shared power-save template: enabled flag plus two 8-bit timer encodings.
const PSM: &str = r#"AT+CPSMS={enabled},,,"{periodic_timer}","{active_time}""#;

/// eDRX off for the NB-IoT access technology.
const DISABLE_EDRX: &str = "AT+CEDRXS=0,5";

/// SARA-N2 family.
pub fn sara_n2() -> DeviceSpec {
    DeviceSpec {
        reboot: template("AT+NRB"),
        firmware_version: template("ATI9"),
        radio: template("AT+CFUN={state}"),
        config_apn: template(r#"AT+CGDCONT=0,"IP","{apn}";+CGATT=1"#),
        auto_operator_selection: template("AT+COPS=0"),
        registration_status: template("AT+CEREG?"),
        psm: template(PSM),
        disable_edrx: template(DISABLE_EDRX),
        create_udp_socket: template(r#"AT+NSOCR="DGRAM",17,{port},1"#),
        close_socket: template("AT+NSOCL={socket}"),
        send_datagram: template(
            r#"AT+NSOSTF={socket},"{ip}",{port},{flag_hex},{length},"{payload}""#,
        ),
        receive_datagram: template("AT+NSORF={socket},{length}"),
        received_message_indication: template("+NSONMI"),
        ..DeviceSpec::new("SARA-N2", 9600)
    }
}

/// SARA-R4 family.
pub fn sara_r4() -> DeviceSpec {
    DeviceSpec {
        reboot: template("AT+CFUN=15"),
        config_apn: template(r#"AT+CGDCONT=0,"IP","{apn}""#),
        auto_operator_selection: template("AT+COPS=0"),
        psm: template(PSM),
        disable_edrx: template(DISABLE_EDRX),
        create_udp_socket: template("AT+USOCR=17,{port}"),
        create_tcp_socket: template("AT+USOCR=6,{port}"),
        close_socket: template("AT+NSOCL={socket}"),
        send_datagram: template(r#"AT+NSOST={socket},"{ip}",{port},{flag},"{payload}""#),
        ..DeviceSpec::new("SARA-R4", 115_200)
    }
}

/// Every built-in family, paired with its short alias.
pub fn all_families() -> Vec<(&'static str, DeviceSpec)> {
    vec![("n2", sara_n2()), ("r4", sara_r4())]
}

/// Look up a built-in family by alias or name, case-insensitively.
///
/// Accepts `n2`, `sara-n2`, `SARA_N2`, and so on.
pub fn lookup_family(name: &str) -> Option<DeviceSpec> {
    let wanted = name.trim().to_ascii_lowercase().replace('_', "-");
    all_families()
        .into_iter()
        .find(|(alias, spec)| {
            wanted == *alias
                || wanted == spec.name.to_ascii_lowercase()
                || wanted == format!("sara-{}", alias)
        })
        .map(|(_, spec)| spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{render, Intent};

    #[test]
    fn builtin_specs_validate() {
        for (alias, spec) in all_families() {
            spec.validate()
                .unwrap_or_else(|e| panic!("{} failed validation: {}", alias, e));
        }
    }

    #[test]
    fn n2_baud_and_indication() {
        let spec = sara_n2();
        assert_eq!(spec.baud_rate, 9600);
        assert_eq!(spec.indication_prefix(), Some("+NSONMI"));
        assert_eq!(spec.template(Intent::CreateTcpSocket), None);
    }

    #[test]
    fn r4_lacks_radio_registration_and_receive() {
        let spec = sara_r4();
        assert_eq!(spec.baud_rate, 115_200);
        assert_eq!(spec.template(Intent::Radio), None);
        assert_eq!(spec.template(Intent::RegistrationStatus), None);
        assert_eq!(spec.template(Intent::FirmwareVersion), None);
        assert_eq!(spec.template(Intent::ReceiveDatagram), None);
        assert_eq!(spec.indication_prefix(), None);
    }

    #[test]
    fn n2_send_template_renders_hex_flag() {
        let spec = sara_n2();
        let cmd = render(
            spec.template(Intent::SendDatagram).unwrap(),
            &[
                ("socket", &0),
                ("ip", &"1.2.3.4"),
                ("port", &1234),
                ("flag", &512),
                ("flag_hex", &"0x200"),
                ("length", &2),
                ("payload", &"6869"),
            ],
        )
        .unwrap();
        assert_eq!(cmd, r#"AT+NSOSTF=0,"1.2.3.4",1234,0x200,2,"6869""#);
    }

    #[test]
    fn r4_send_template_uses_decimal_flag_and_no_length() {
        let spec = sara_r4();
        let cmd = render(
            spec.template(Intent::SendDatagram).unwrap(),
            &[
                ("socket", &0),
                ("ip", &"1.2.3.4"),
                ("port", &1234),
                ("flag", &512),
                ("flag_hex", &"0x200"),
                ("length", &2),
                ("payload", &"6869"),
            ],
        )
        .unwrap();
        assert_eq!(cmd, r#"AT+NSOST=0,"1.2.3.4",1234,512,"6869""#);
    }

    #[test]
    fn n2_apn_template_attaches() {
        let spec = sara_n2();
        let cmd = render(
            spec.template(Intent::ConfigApn).unwrap(),
            &[("apn", &"tdt2.telenor.iot")],
        )
        .unwrap();
        assert_eq!(cmd, r#"AT+CGDCONT=0,"IP","tdt2.telenor.iot";+CGATT=1"#);
    }

    #[test]
    fn lookup_accepts_aliases_and_names() {
        assert_eq!(lookup_family("n2").unwrap().name, "SARA-N2");
        assert_eq!(lookup_family("SARA-N2").unwrap().name, "SARA-N2");
        assert_eq!(lookup_family("sara_r4").unwrap().name, "SARA-R4");
        assert_eq!(lookup_family(" R4 ").unwrap().name, "SARA-R4");
        assert!(lookup_family("bg96").is_none());
    }

    #[test]
    fn all_families_have_unique_aliases() {
        let families = all_families();
        let mut aliases: Vec<&str> = families.iter().map(|(a, _)| *a).collect();
        aliases.sort();
        aliases.dedup();
        assert_eq!(aliases.len(), families.len());
    }

    #[test]
    fn all_families_can_open_udp_sockets() {
        for (alias, spec) in all_families() {
            assert!(
                spec.template(Intent::CreateUdpSocket).is_some(),
                "{} should support UDP",
                alias
            );
        }
    }
}
