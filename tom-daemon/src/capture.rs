//! Live packet source backed by libpcap.
//!
//! [`PcapSource`] opens one interface with the `[capture]` settings and
//! hands frames to the accounting session one at a time. A read timeout
//! is reported as [`CaptureOutcome::Timeout`] so the session can purge
//! idle hosts on a silent link.

use pcap::{Active, Capture, Device};
use tracing::{debug, info};

use tom_core::config::CaptureConfig;
use tom_core::error::{CaptureError, TomError};
use tom_core::pipeline::PacketSource;
use tom_core::types::{CaptureOutcome, Frame};

/// Packet source reading from a live interface.
pub struct PcapSource {
    interface: String,
    capture: Capture<Active>,
}

impl PcapSource {
    /// Open the configured interface.
    ///
    /// # Errors
    ///
    /// - `CaptureError::Open` if the device cannot be opened (missing
    ///   interface, insufficient privileges)
    /// - `CaptureError::Filter` if `bpf_filter` does not compile
    pub fn open(config: &CaptureConfig) -> Result<Self, TomError> {
        let interface = config.interface.clone();
        let open_err = |e: pcap::Error| CaptureError::Open {
            interface: interface.clone(),
            reason: e.to_string(),
        };

        debug!(
            interface = %interface,
            snaplen = config.snaplen,
            promiscuous = config.promiscuous,
            timeout_ms = config.timeout_ms,
            "opening capture"
        );

        let mut capture = Capture::from_device(Device::from(interface.as_str()))
            .map_err(open_err)?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .immediate_mode(true)
            .open()
            .map_err(open_err)?;

        if !config.bpf_filter.is_empty() {
            capture
                .filter(&config.bpf_filter, true)
                .map_err(|e| CaptureError::Filter {
                    filter: config.bpf_filter.clone(),
                    reason: e.to_string(),
                })?;
            debug!(filter = %config.bpf_filter, "capture filter applied");
        }

        info!(interface = %interface, "capture opened");
        Ok(Self { interface, capture })
    }
}

impl PacketSource for PcapSource {
    fn name(&self) -> &str {
        &self.interface
    }

    fn next_frame(&mut self) -> Result<CaptureOutcome, TomError> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let timestamp = u64::try_from(packet.header.ts.tv_sec).unwrap_or(0);
                let mut frame = Frame::new(packet.data.to_vec(), timestamp);
                frame.capture_len = packet.header.caplen;
                Ok(CaptureOutcome::Frame(frame))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(CaptureOutcome::Timeout),
            Err(e) => Err(CaptureError::Fatal(format!("{}: {}", self.interface, e)).into()),
        }
    }
}
