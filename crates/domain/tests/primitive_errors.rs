//! Integration coverage for domain primitive errors.

use tagstream_domain::{BinWidth, ChannelId, ChannelRoles, PrimitiveError, TagBlock};
use tagstream_shared::{ErrorEnvelope, ErrorKind};

#[test]
fn primitive_errors_map_into_error_envelopes() -> Result<(), PrimitiveError> {
    let Err(error) = BinWidth::new(0) else {
        return Err(PrimitiveError::NonPositiveBinWidth { value: 0 });
    };

    let envelope: ErrorEnvelope = error.into();
    assert_eq!(envelope.kind, ErrorKind::Expected);
    assert_eq!(envelope.code.namespace(), "domain");
    assert_eq!(envelope.code.code(), "invalid_bin_width");
    assert_eq!(envelope.metadata.get("value"), Some(&"0".to_string()));

    let Err(block_error) = TagBlock::new(Vec::new(), 9, 3) else {
        return Err(PrimitiveError::InvertedBlockRange {
            begin_time: 9,
            end_time: 3,
        });
    };

    let envelope: ErrorEnvelope = block_error.into();
    assert_eq!(envelope.code.code(), "invalid_block_range");
    assert_eq!(envelope.metadata.get("begin_time"), Some(&"9".to_string()));
    assert_eq!(envelope.metadata.get("end_time"), Some(&"3".to_string()));

    Ok(())
}

#[test]
fn unused_click_channel_surfaces_metadata() -> Result<(), PrimitiveError> {
    let Err(error) = ChannelRoles::resolve(ChannelId::UNUSED, ChannelId::new(1), |channel| {
        channel.is_unused()
    }) else {
        return Err(PrimitiveError::UnusedClickChannel {
            channel: ChannelId::UNUSED,
        });
    };

    let envelope: ErrorEnvelope = error.into();
    assert_eq!(envelope.code.code(), "invalid_channel");
    assert_eq!(envelope.metadata.get("channel"), Some(&"unused".to_string()));

    Ok(())
}
