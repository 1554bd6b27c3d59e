//! Frame encoding for Sampled Values style broadcasts
//!
//! [`SvFrameEncoder`] lays a [`Snapshot`] out as an IEC 61850-9-2 style
//! Ethernet frame:
//!
//! ```text
//! dst(6) src(6) [0x8100 TCI(2)] 0x88BA APPID(2) LEN(2) RES1(2) RES2(2)
//! savPdu 0x60 {
//!     noASDU   0x80  (channel count)
//!     seqASDU  0xA2 {
//!         ASDU 0x30 { svID 0x80, smpCnt 0x82, confRev 0x83, smpSynch 0x85, seqData 0x87 }
//!         ... one ASDU per channel, in channel order
//!     }
//! }
//! ```
//!
//! `seqData` holds each value's 32-bit payload big-endian, in value order.
//! Lengths use BER definite form.

use crate::error::{Result, SvPubError};
use crate::types::{ChannelSnapshot, Snapshot};

/// EtherType assigned to Sampled Values
pub const ETHERTYPE_SV: u16 = 0x88BA;

/// EtherType of an 802.1Q tag
const ETHERTYPE_VLAN: u16 = 0x8100;

/// Largest frame accepted, excluding the FCS
pub const MAX_FRAME_LEN: usize = 1518;

/// Default multicast destination for Sampled Values
pub const DEFAULT_DESTINATION: [u8; 6] = [0x01, 0x0C, 0xCD, 0x04, 0x00, 0x01];

/// Default application identifier
pub const DEFAULT_APP_ID: u16 = 0x4000;

const TAG_SAV_PDU: u8 = 0x60;
const TAG_NO_ASDU: u8 = 0x80;
const TAG_SEQ_ASDU: u8 = 0xA2;
const TAG_ASDU: u8 = 0x30;
const TAG_SV_ID: u8 = 0x80;
const TAG_SMP_CNT: u8 = 0x82;
const TAG_CONF_REV: u8 = 0x83;
const TAG_SMP_SYNCH: u8 = 0x85;
const TAG_SEQ_DATA: u8 = 0x87;

/// Turns snapshots into link-layer frames
pub trait FrameEncoder: Send {
    /// Encode `snapshot` into `out`, replacing its previous contents
    fn encode(&mut self, snapshot: &Snapshot, out: &mut Vec<u8>) -> Result<()>;
}

/// 802.1Q priority tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    /// Priority code point (0-7)
    pub priority: u8,
    /// VLAN identifier (0-4095)
    pub id: u16,
}

impl VlanTag {
    fn tci(self) -> u16 {
        ((self.priority as u16 & 0x7) << 13) | (self.id & 0x0FFF)
    }
}

impl Default for VlanTag {
    fn default() -> Self {
        Self { priority: 4, id: 0 }
    }
}

/// IEC 61850-9-2 style frame encoder
#[derive(Debug, Clone)]
pub struct SvFrameEncoder {
    pub destination: [u8; 6],
    pub source: [u8; 6],
    pub vlan: Option<VlanTag>,
    pub app_id: u16,
    pub conf_rev: u32,
    pub smp_synch: u8,
    /// Scratch buffer for the APDU, reused across frames
    apdu: Vec<u8>,
}

impl SvFrameEncoder {
    /// Create an encoder with default addressing for the given source MAC
    pub fn new(source: [u8; 6]) -> Self {
        Self {
            destination: DEFAULT_DESTINATION,
            source,
            vlan: Some(VlanTag::default()),
            app_id: DEFAULT_APP_ID,
            conf_rev: 1,
            smp_synch: 0,
            apdu: Vec::with_capacity(256),
        }
    }

    /// Set the destination MAC
    pub fn with_destination(mut self, destination: [u8; 6]) -> Self {
        self.destination = destination;
        self
    }

    /// Set or clear the VLAN tag
    pub fn with_vlan(mut self, vlan: Option<VlanTag>) -> Self {
        self.vlan = vlan;
        self
    }

    /// Set the application identifier
    pub fn with_app_id(mut self, app_id: u16) -> Self {
        self.app_id = app_id;
        self
    }

    /// Set the configuration revision
    pub fn with_conf_rev(mut self, conf_rev: u32) -> Self {
        self.conf_rev = conf_rev;
        self
    }

    /// Set the synchronisation indicator
    pub fn with_smp_synch(mut self, smp_synch: u8) -> Self {
        self.smp_synch = smp_synch;
        self
    }

    fn encode_asdu(&self, channel: &ChannelSnapshot, sample_count: u16, out: &mut Vec<u8>) {
        let mut body = Vec::with_capacity(32 + channel.name.len() + channel.samples.len() * 4);
        write_tlv(&mut body, TAG_SV_ID, channel.name.as_bytes());
        write_tlv(&mut body, TAG_SMP_CNT, &sample_count.to_be_bytes());
        write_tlv(&mut body, TAG_CONF_REV, &self.conf_rev.to_be_bytes());
        write_tlv(&mut body, TAG_SMP_SYNCH, &[self.smp_synch]);

        let data: Vec<u8> = channel
            .samples
            .iter()
            .flat_map(|s| s.to_be_bytes())
            .collect();
        write_tlv(&mut body, TAG_SEQ_DATA, &data);

        write_tlv(out, TAG_ASDU, &body);
    }
}

impl FrameEncoder for SvFrameEncoder {
    fn encode(&mut self, snapshot: &Snapshot, out: &mut Vec<u8>) -> Result<()> {
        let asdu_count = u8::try_from(snapshot.channels.len()).map_err(|_| {
            SvPubError::Transmit(format!(
                "{} channels do not fit in one frame",
                snapshot.channels.len()
            ))
        })?;

        let mut seq = Vec::new();
        for channel in &snapshot.channels {
            self.encode_asdu(channel, snapshot.sample_count, &mut seq);
        }

        let mut pdu = Vec::with_capacity(seq.len() + 8);
        write_tlv(&mut pdu, TAG_NO_ASDU, &[asdu_count]);
        write_tlv(&mut pdu, TAG_SEQ_ASDU, &seq);

        self.apdu.clear();
        write_tlv(&mut self.apdu, TAG_SAV_PDU, &pdu);

        // LEN counts from APPID to the end of the APDU
        let sv_len = 8 + self.apdu.len();
        let sv_len = u16::try_from(sv_len)
            .map_err(|_| SvPubError::Transmit(format!("frame payload of {} bytes", sv_len)))?;

        out.clear();
        out.extend_from_slice(&self.destination);
        out.extend_from_slice(&self.source);
        if let Some(vlan) = self.vlan {
            out.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
            out.extend_from_slice(&vlan.tci().to_be_bytes());
        }
        out.extend_from_slice(&ETHERTYPE_SV.to_be_bytes());
        out.extend_from_slice(&self.app_id.to_be_bytes());
        out.extend_from_slice(&sv_len.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&self.apdu);

        if out.len() > MAX_FRAME_LEN {
            return Err(SvPubError::Transmit(format!(
                "frame of {} bytes exceeds {} byte limit",
                out.len(),
                MAX_FRAME_LEN
            )));
        }
        Ok(())
    }
}

/// Append a BER definite-form length
fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
}

fn write_tlv(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    write_length(out, value.len());
    out.extend_from_slice(value);
}

/// Parse a `aa:bb:cc:dd:ee:ff` MAC address
pub fn parse_mac(text: &str) -> Result<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = text.trim().split([':', '-']);
    for byte in mac.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| SvPubError::InvalidParameter(format!("MAC address '{}'", text)))?;
        *byte = u8::from_str_radix(part, 16)
            .map_err(|_| SvPubError::InvalidParameter(format!("MAC address '{}'", text)))?;
    }
    if parts.next().is_some() {
        return Err(SvPubError::InvalidParameter(format!("MAC address '{}'", text)));
    }
    Ok(mac)
}
