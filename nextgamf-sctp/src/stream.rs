//! Stream read/write helpers shared by the client association and the server.

use std::collections::VecDeque;

use bytes::Bytes;
use sctp_proto::{Association, PayloadProtocolIdentifier};
use tracing::{trace, warn};

use crate::association::{ReceivedMessage, NGAP_PPID};

/// Maps the sctp-proto identifier back to a numeric PPID.
///
/// sctp-proto only names the WebRTC identifiers; anything else, NGAP included,
/// arrives as `Unknown`.
pub(crate) fn ppid_of(ppi: PayloadProtocolIdentifier) -> u32 {
    match ppi {
        PayloadProtocolIdentifier::Dcep => 50,
        PayloadProtocolIdentifier::String => 51,
        PayloadProtocolIdentifier::Binary => 53,
        PayloadProtocolIdentifier::StringEmpty => 56,
        PayloadProtocolIdentifier::BinaryEmpty => 57,
        PayloadProtocolIdentifier::Unknown => NGAP_PPID,
    }
}

/// Queues one message on `stream_id`, opening the stream on first use.
pub(crate) fn write_message(
    association: &mut Association,
    stream_id: u16,
    data: &[u8],
    ppid: u32,
) -> Result<(), sctp_proto::Error> {
    let ppi = PayloadProtocolIdentifier::from(ppid);
    if association.stream(stream_id).is_err() {
        association.open_stream(stream_id, ppi)?;
    }
    let mut stream = association.stream(stream_id)?;
    stream.write_with_ppi(data, ppi)?;
    Ok(())
}

/// Reads every complete message buffered on `stream_id` into `inbox`.
///
/// Each SCTP user message becomes exactly one `ReceivedMessage`; messages
/// tagged with a PPID other than `accept_ppid` are dropped.
pub(crate) fn drain_stream(
    association: &mut Association,
    stream_id: u16,
    accept_ppid: u32,
    inbox: &mut VecDeque<ReceivedMessage>,
) {
    let Ok(mut stream) = association.stream(stream_id) else {
        return;
    };

    while let Ok(Some(chunks)) = stream.read() {
        let ppid = ppid_of(chunks.ppi);
        let mut buf = vec![0u8; chunks.len()];
        let len = match chunks.read(&mut buf) {
            Ok(len) => len,
            Err(e) => {
                warn!("Failed to read message on stream {}: {}", stream_id, e);
                continue;
            }
        };
        buf.truncate(len);

        if ppid != accept_ppid {
            warn!(
                "Dropping {} bytes on stream {} with foreign PPID {}",
                len, stream_id, ppid
            );
            continue;
        }

        trace!("Read {} bytes on stream {}", len, stream_id);
        inbox.push_back(ReceivedMessage {
            stream_id,
            data: Bytes::from(buf),
            ppid,
        });
    }
}

/// Accepts newly opened remote streams and drains them together with the
/// already-known streams flagged readable.
pub(crate) fn collect_readable(
    association: &mut Association,
    readable: &mut VecDeque<u16>,
    accept_ppid: u32,
    inbox: &mut VecDeque<ReceivedMessage>,
) {
    while let Some(stream) = association.accept_stream() {
        readable.push_back(stream.stream_identifier());
    }
    while let Some(stream_id) = readable.pop_front() {
        drain_stream(association, stream_id, accept_ppid, inbox);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ppid_mapping() {
        assert_eq!(ppid_of(PayloadProtocolIdentifier::Binary), 53);
        assert_eq!(ppid_of(PayloadProtocolIdentifier::from(NGAP_PPID)), NGAP_PPID);
    }
}
