//! Attribute-table primitives shared by the discovery walker, the
//! transport adapters and the simulated peripheral.

use heapless::Vec;

use crate::config::{HANDLE_MAX, HANDLE_MIN};

/// What a range-discovery request looks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttributeKind {
    PrimaryService,
    Characteristic,
    Descriptor,
}

/// Inclusive attribute handle range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

impl HandleRange {
    /// `[0x0001, 0xFFFF]`
    pub const fn full() -> Self {
        Self {
            start: HANDLE_MIN,
            end: HANDLE_MAX,
        }
    }

    /// The range strictly after `handle`, up to 0xFFFF.
    ///
    /// `None` when `handle` is already the last handle.
    pub fn after(handle: u16) -> Option<Self> {
        handle.checked_add(1).map(|start| Self {
            start,
            end: HANDLE_MAX,
        })
    }

    pub fn contains(&self, handle: u16) -> bool {
        self.start <= handle && handle <= self.end
    }
}

/// One discovered attribute.
///
/// `handle` is the attribute's own handle (service or characteristic
/// declaration, or descriptor). For characteristics `value_handle` is
/// where the value lives; for the other kinds it equals `handle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attribute {
    pub handle: u16,
    pub value_handle: u16,
}

impl Attribute {
    pub const fn service(handle: u16) -> Self {
        Self {
            handle,
            value_handle: handle,
        }
    }

    pub const fn characteristic(decl_handle: u16, value_handle: u16) -> Self {
        Self {
            handle: decl_handle,
            value_handle,
        }
    }

    pub const fn descriptor(handle: u16) -> Self {
        Self {
            handle,
            value_handle: handle,
        }
    }
}

/// A single range query: "first `kind` with `uuid` inside `range`".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoverRequest {
    pub kind: AttributeKind,
    pub uuid: u16,
    pub range: HandleRange,
}

/// Row of an [`AttributeTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttributeEntry {
    pub kind: AttributeKind,
    pub uuid: u16,
    pub attribute: Attribute,
}

/// Fixed-capacity attribute table answering [`DiscoverRequest`]s.
///
/// Entries are kept in insertion order, which callers keep ascending by
/// handle (the order a GATT server lays them out).
#[derive(Clone, Debug, Default)]
pub struct AttributeTable<const N: usize> {
    entries: Vec<AttributeEntry, N>,
}

impl<const N: usize> AttributeTable<N> {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append an entry. Returns `false` when the table is full.
    pub fn push(&mut self, kind: AttributeKind, uuid: u16, attribute: Attribute) -> bool {
        self.entries
            .push(AttributeEntry {
                kind,
                uuid,
                attribute,
            })
            .is_ok()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AttributeEntry] {
        &self.entries
    }

    /// First entry matching kind and UUID whose handle lies in the range.
    pub fn find(&self, request: &DiscoverRequest) -> Option<Attribute> {
        self.entries
            .iter()
            .find(|e| {
                e.kind == request.kind
                    && e.uuid == request.uuid
                    && request.range.contains(e.attribute.handle)
            })
            .map(|e| e.attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_after_advances_by_one() {
        assert_eq!(
            HandleRange::after(0x0010),
            Some(HandleRange {
                start: 0x0011,
                end: 0xFFFF
            })
        );
    }

    #[test]
    fn range_after_last_handle_is_empty() {
        assert_eq!(HandleRange::after(0xFFFF), None);
    }

    #[test]
    fn table_find_respects_range_and_kind() {
        let mut table: AttributeTable<4> = AttributeTable::new();
        assert!(table.push(AttributeKind::Descriptor, 0x2902, Attribute::descriptor(0x0005)));
        assert!(table.push(
            AttributeKind::Characteristic,
            0x2BC5,
            Attribute::characteristic(0x0008, 0x0009)
        ));
        assert!(table.push(AttributeKind::Descriptor, 0x2902, Attribute::descriptor(0x000C)));

        let req = DiscoverRequest {
            kind: AttributeKind::Descriptor,
            uuid: 0x2902,
            range: HandleRange {
                start: 0x0006,
                end: 0xFFFF,
            },
        };
        assert_eq!(table.find(&req), Some(Attribute::descriptor(0x000C)));

        let wrong_kind = DiscoverRequest {
            kind: AttributeKind::PrimaryService,
            ..req
        };
        assert_eq!(table.find(&wrong_kind), None);
    }

    #[test]
    fn table_push_reports_full() {
        let mut table: AttributeTable<1> = AttributeTable::new();
        assert!(table.push(AttributeKind::PrimaryService, 0x2BC4, Attribute::service(1)));
        assert!(!table.push(AttributeKind::PrimaryService, 0x2BC4, Attribute::service(2)));
        assert_eq!(table.len(), 1);
    }
}
