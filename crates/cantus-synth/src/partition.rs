//! Basic-channel partitioning.
//!
//! Works on a snapshot of every channel's [`ModeAssignment`]; callers write
//! the result back to the channels that changed. Every function validates
//! before touching the snapshot, so an `Err` leaves it untouched.

use std::ops::Range;

use crate::mode::{BasicChannelInfo, ChannelMode, ModeAssignment, PartitionStatus};
use crate::{Error, Result};

/// Enabled basic channels in channel order.
pub fn basic_channels(assignments: &[ModeAssignment]) -> Vec<BasicChannelInfo> {
    assignments
        .iter()
        .enumerate()
        .filter(|(_, a)| a.basic && a.enabled)
        .map(|(ch, a)| BasicChannelInfo::new(ch, a.mode, a.val))
        .collect()
}

/// Zone descriptor governing `channel`, if the channel is enabled.
pub fn governing(assignments: &[ModeAssignment], channel: usize) -> Option<BasicChannelInfo> {
    let own = assignments.get(channel)?;
    if !own.enabled {
        return None;
    }
    let head = &assignments[own.head];
    Some(BasicChannelInfo::new(own.head, head.mode, head.val))
}

/// Zone length for `info` given where the next basic channel starts.
fn zone_len(info: &BasicChannelInfo, channels: usize, next_head: Option<usize>) -> Result<usize> {
    if info.mode != ChannelMode::OmniOffMono {
        return Ok(1);
    }
    if info.val == 0 {
        return Ok(next_head.unwrap_or(channels) - info.basic_channel);
    }
    if info.basic_channel + info.val > channels {
        return Err(Error::invalid(format!(
            "mono zone {}..{} exceeds {} channels",
            info.basic_channel,
            info.basic_channel + info.val,
            channels
        )));
    }
    Ok(info.val)
}

fn check_channel(channel: usize, channels: usize) -> Result<()> {
    if channel >= channels {
        return Err(Error::invalid(format!(
            "basic channel {channel} (have {channels} channels)"
        )));
    }
    Ok(())
}

fn assign(assignments: &mut [ModeAssignment], info: &BasicChannelInfo, zone: Range<usize>) {
    let val = zone.len();
    for ch in zone {
        assignments[ch] = ModeAssignment {
            mode: info.mode,
            basic: ch == info.basic_channel,
            enabled: true,
            head: info.basic_channel,
            val: if ch == info.basic_channel { val } else { 0 },
        };
    }
}

/// Make `info.basic_channel` a basic channel, replacing any zone it already
/// heads. Returns the channels of the new zone.
///
/// Fails if the zone would overlap a zone headed by another channel.
pub fn set_basic_channel(
    assignments: &mut [ModeAssignment],
    info: &BasicChannelInfo,
) -> Result<Range<usize>> {
    let channels = assignments.len();
    check_channel(info.basic_channel, channels)?;

    let head = info.basic_channel;
    let next_head = (head + 1..channels).find(|&ch| {
        let a = &assignments[ch];
        a.enabled && a.head != head
    });
    let len = zone_len(info, channels, next_head)?;
    let zone = head..head + len;

    if let Some(ch) = zone
        .clone()
        .find(|&ch| assignments[ch].enabled && assignments[ch].head != head)
    {
        return Err(Error::invalid(format!(
            "zone {}..{} overlaps basic channel {}",
            zone.start, zone.end, assignments[ch].head
        )));
    }

    for (ch, a) in assignments.iter_mut().enumerate() {
        if a.enabled && a.head == head {
            *a = ModeAssignment::disabled(ch);
        }
    }
    assign(assignments, info, zone.clone());
    Ok(zone)
}

/// Disable the zone headed by `channel`, or every zone when `None`.
pub fn reset_basic_channel(
    assignments: &mut [ModeAssignment],
    channel: Option<usize>,
) -> Result<()> {
    match channel {
        Some(head) => {
            check_channel(head, assignments.len())?;
            if !(assignments[head].basic && assignments[head].enabled) {
                return Err(Error::invalid(format!("channel {head} is not a basic channel")));
            }
            for (ch, a) in assignments.iter_mut().enumerate() {
                if a.enabled && a.head == head {
                    *a = ModeAssignment::disabled(ch);
                }
            }
        }
        None => {
            for (ch, a) in assignments.iter_mut().enumerate() {
                *a = ModeAssignment::disabled(ch);
            }
        }
    }
    Ok(())
}

/// Replace the whole partition with `infos`.
///
/// All descriptors are validated before anything is committed. Channels
/// left outside every zone are reported as [`PartitionStatus::Ambiguous`];
/// the partition is still committed.
pub fn reset_basic_channels(
    assignments: &mut [ModeAssignment],
    infos: &[BasicChannelInfo],
) -> Result<PartitionStatus> {
    let channels = assignments.len();
    let mut sorted = infos.to_vec();
    sorted.sort_by_key(|info| info.basic_channel);

    for info in &sorted {
        check_channel(info.basic_channel, channels)?;
    }
    if let Some(pair) = sorted
        .windows(2)
        .find(|pair| pair[0].basic_channel == pair[1].basic_channel)
    {
        return Err(Error::invalid(format!(
            "basic channel {} given twice",
            pair[0].basic_channel
        )));
    }

    let mut zones = Vec::with_capacity(sorted.len());
    for (i, info) in sorted.iter().enumerate() {
        let next_head = sorted.get(i + 1).map(|next| next.basic_channel);
        let len = zone_len(info, channels, next_head)?;
        let zone = info.basic_channel..info.basic_channel + len;
        if let Some(next) = next_head {
            if zone.end > next {
                return Err(Error::invalid(format!(
                    "zone {}..{} overlaps basic channel {}",
                    zone.start, zone.end, next
                )));
            }
        }
        zones.push(zone);
    }

    for (ch, a) in assignments.iter_mut().enumerate() {
        *a = ModeAssignment::disabled(ch);
    }
    for (info, zone) in sorted.iter().zip(zones) {
        assign(assignments, info, zone);
    }

    let unassigned: Vec<usize> = assignments
        .iter()
        .enumerate()
        .filter(|(_, a)| !a.enabled)
        .map(|(ch, _)| ch)
        .collect();

    if unassigned.is_empty() {
        Ok(PartitionStatus::Applied)
    } else {
        Ok(PartitionStatus::Ambiguous { unassigned })
    }
}
