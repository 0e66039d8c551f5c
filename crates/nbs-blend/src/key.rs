use std::cmp::Ordering;

use nbs_wire::Frame;

/// Wrapped distance between two sequence counters, read as signed: a
/// difference of more than half the modulus counts as "behind".
#[inline]
fn cmp_wrapping_u32(a: u32, b: u32) -> Ordering {
    (a.wrapping_sub(b) as i32).cmp(&0)
}

#[inline]
fn cmp_wrapping_u16(a: u16, b: u16) -> Ordering {
    (a.wrapping_sub(b) as i16).cmp(&0)
}

/// Total order over frames spanning uplink, ground-station and data-server
/// changes.
///
/// `uplink` partitions eras separated by NCF switchovers and dominates the
/// comparison. Within an era the product sequence and block number define
/// stream order; a Master Ground Station switch jumps the frame-level
/// sequence number without touching them, so that number is ignored.
/// The exception is when it disagrees in direction with the product
/// sequence, the signature of a data-server switch resetting the product
/// counter.
///
/// Two keys are equal exactly when they occupy the same slot in the stream:
/// that is the deduplication criterion.
#[derive(Clone, Copy, Debug)]
pub struct OrderingKey {
    pub uplink: u64,
    pub source: u8,
    pub fh_seq: u32,
    pub run: u16,
    pub product_seq: u32,
    pub block: u16,
}

impl OrderingKey {
    pub fn new(uplink: u64, frame: &Frame) -> Self {
        let fh = frame.header();
        let pdh = frame.pdh();
        Self {
            uplink,
            source: fh.source,
            fh_seq: fh.sequence_number,
            run: fh.run_number,
            product_seq: pdh.product_sequence_number,
            block: pdh.block_number,
        }
    }

    /// Conservative immediate-successor relation: same uplink and run, and
    /// either the next block of the same product or block zero of the next
    /// product. Keys that are not successors still drain once their reveal
    /// deadline passes.
    pub fn is_successor_of(&self, prev: &Self) -> bool {
        self.uplink == prev.uplink
            && self.run == prev.run
            && ((self.product_seq == prev.product_seq && self.block == prev.block.wrapping_add(1))
                || (self.product_seq == prev.product_seq.wrapping_add(1) && self.block == 0))
    }
}

impl Ord for OrderingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.uplink.cmp(&other.uplink) {
            Ordering::Equal => {}
            uplink => return uplink,
        }
        let product = cmp_wrapping_u32(self.product_seq, other.product_seq);
        let fh = cmp_wrapping_u32(self.fh_seq, other.fh_seq);
        if product != Ordering::Equal && fh != Ordering::Equal && product != fh {
            // Product counter reset while the frame counter kept advancing:
            // a data-server switch. The frame counter is the one to trust.
            return fh;
        }
        product
            .then(cmp_wrapping_u16(self.block, other.block))
            .then(cmp_wrapping_u16(self.run, other.run))
    }
}

impl PartialOrd for OrderingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OrderingKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderingKey {}
