//! Side index mapping sheet coordinates to the records that populate them.

use std::collections::BTreeMap;

use crate::value::{Fields, Value};

/// Points at a decoded record inside a substream's per-name collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    pub record: &'static str,
    /// Zero-based position within the record's collection.
    pub index: usize,
}

/// Bounding box of the cells that carry values, per sheet. Unlike the
/// Dimensions record this ignores formatted-but-empty cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueDimensions {
    pub row_min: u32,
    pub row_max: u32,
    pub col_min: u32,
    pub col_max: u32,
}

impl ValueDimensions {
    fn grow(&mut self, row: u32, col: u32) {
        self.row_min = self.row_min.min(row);
        self.row_max = self.row_max.max(row);
        self.col_min = self.col_min.min(col);
        self.col_max = self.col_max.max(col);
    }
}

type Coord = (usize, u32, u32);

/// Coordinate lookups over the cell-bearing records of a parse.
///
/// The sheet component of every key is the substream's position in the
/// workbook, with the globals substream at 0. Later records writing to the
/// same coordinate replace the earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressIndex {
    pub cells: BTreeMap<Coord, Locator>,
    pub hlinks: BTreeMap<Coord, usize>,
    pub hlink_tooltips: BTreeMap<Coord, usize>,
    pub notes: BTreeMap<Coord, usize>,
    pub dimensions: BTreeMap<usize, ValueDimensions>,
}

fn uint(fields: &Fields, name: &str) -> Option<u32> {
    match fields.get(name)? {
        Value::Uint(v) => u32::try_from(*v).ok(),
        Value::Int(v) => u32::try_from(*v).ok(),
        _ => None,
    }
}

impl AddressIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn grow_value_box(&mut self, sheet: usize, row: u32, col: u32) {
        self.dimensions
            .entry(sheet)
            .and_modify(|d| d.grow(row, col))
            .or_insert(ValueDimensions {
                row_min: row,
                row_max: row,
                col_min: col,
                col_max: col,
            });
    }

    fn point(&mut self, sheet: usize, fields: &Fields, loc: Locator, value: bool) {
        let (Some(row), Some(col)) = (uint(fields, "rw"), uint(fields, "col")) else {
            return;
        };
        self.cells.insert((sheet, row, col), loc);
        if value {
            self.grow_value_box(sheet, row, col);
        }
    }

    fn column_run(&mut self, sheet: usize, fields: &Fields, loc: Locator, value: bool) {
        let (Some(row), Some(first), Some(last)) = (
            uint(fields, "rw"),
            uint(fields, "colFirst"),
            uint(fields, "colLast"),
        ) else {
            return;
        };
        for col in first..=last {
            self.cells.insert((sheet, row, col), loc);
            if value {
                self.grow_value_box(sheet, row, col);
            }
        }
    }

    fn range(map: &mut BTreeMap<Coord, usize>, sheet: usize, fields: &Fields, index: usize) {
        let (Some(rw_first), Some(rw_last), Some(col_first), Some(col_last)) = (
            uint(fields, "rwFirst"),
            uint(fields, "rwLast"),
            uint(fields, "colFirst"),
            uint(fields, "colLast"),
        ) else {
            return;
        };
        for row in rw_first..=rw_last {
            for col in col_first..=col_last {
                map.insert((sheet, row, col), index);
            }
        }
    }

    /// Feeds one decoded serial record into the index. Records that do not
    /// address cells are ignored.
    pub fn observe(&mut self, sheet: usize, record: &'static str, index: usize, fields: &Fields) {
        let loc = Locator { record, index };
        match record {
            "Blank" => self.point(sheet, fields, loc, false),
            "BoolErr" | "LabelSst" | "Number" | "RK" | "Formula" => {
                self.point(sheet, fields, loc, true)
            }
            "MulBlank" => self.column_run(sheet, fields, loc, false),
            "MulRk" => self.column_run(sheet, fields, loc, true),
            "HLink" => Self::range(&mut self.hlinks, sheet, fields, index),
            "HLinkTooltip" => {
                let Some(Value::Map(header)) = fields.get("frtRefHeaderNoGrbit") else {
                    return;
                };
                let Some(Value::Map(ref8)) = header.get("ref8") else {
                    return;
                };
                Self::range(&mut self.hlink_tooltips, sheet, ref8, index);
            }
            "Note" => {
                if let (Some(row), Some(col)) = (uint(fields, "rw"), uint(fields, "col")) {
                    self.notes.insert((sheet, row, col), index);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell_fields(rw: u32, col: u32) -> Fields {
        let mut f = Fields::new();
        f.push("rw", rw as u64);
        f.push("col", col as u64);
        f.push("ixfe", 15u64);
        f
    }

    fn run_fields(rw: u32, first: u32, last: u32) -> Fields {
        let mut f = Fields::new();
        f.push("rw", rw as u64);
        f.push("colFirst", first as u64);
        f.push("colLast", last as u64);
        f
    }

    fn ref8_fields(rw1: u32, rw2: u32, c1: u32, c2: u32) -> Fields {
        let mut f = Fields::new();
        f.push("rwFirst", rw1 as u64);
        f.push("rwLast", rw2 as u64);
        f.push("colFirst", c1 as u64);
        f.push("colLast", c2 as u64);
        f
    }

    #[test]
    fn multi_column_records_fan_out() {
        let mut ix = AddressIndex::new();
        ix.observe(1, "MulRk", 0, &run_fields(4, 2, 5));
        for col in 2..=5 {
            assert_eq!(
                ix.cells.get(&(1, 4, col)),
                Some(&Locator { record: "MulRk", index: 0 })
            );
        }
        assert!(!ix.cells.contains_key(&(1, 4, 6)));
    }

    #[test]
    fn later_records_win_the_coordinate() {
        let mut ix = AddressIndex::new();
        ix.observe(1, "Blank", 0, &cell_fields(0, 0));
        ix.observe(1, "Number", 3, &cell_fields(0, 0));
        assert_eq!(
            ix.cells.get(&(1, 0, 0)),
            Some(&Locator { record: "Number", index: 3 })
        );
    }

    #[test]
    fn hyperlink_range_fans_into_side_map() {
        let mut ix = AddressIndex::new();
        let mut f = ref8_fields(0, 1, 0, 1);
        f.push("hlinkClsid", "d0c9ea79-f9ba-ce11-8c82-00aa004ba90b".to_string());
        ix.observe(2, "HLink", 7, &f);
        assert_eq!(ix.hlinks.len(), 4);
        assert_eq!(ix.hlinks.get(&(2, 1, 1)), Some(&7));
        assert!(ix.cells.is_empty());
    }

    #[test]
    fn tooltip_range_read_from_frt_header() {
        let mut ix = AddressIndex::new();
        let mut header = Fields::new();
        header.push("rt", 0x0800u64);
        header.push("ref8", ref8_fields(3, 3, 1, 2));
        let mut f = Fields::new();
        f.push("frtRefHeaderNoGrbit", header);
        f.push("wzTooltip", "hint".to_string());
        ix.observe(1, "HLinkTooltip", 0, &f);
        assert_eq!(ix.hlink_tooltips.len(), 2);
        assert_eq!(ix.hlink_tooltips.get(&(1, 3, 2)), Some(&0));
    }

    #[test]
    fn bounding_box_skips_blank_records() {
        let mut ix = AddressIndex::new();
        ix.observe(1, "Blank", 0, &cell_fields(100, 100));
        ix.observe(1, "MulBlank", 1, &run_fields(200, 0, 30));
        ix.observe(1, "Number", 0, &cell_fields(2, 3));
        ix.observe(1, "RK", 1, &cell_fields(9, 1));

        let dims = ix.dimensions.get(&1).unwrap();
        assert_eq!(
            *dims,
            ValueDimensions { row_min: 2, row_max: 9, col_min: 1, col_max: 3 }
        );
    }

    #[test]
    fn notes_are_single_points() {
        let mut ix = AddressIndex::new();
        ix.observe(1, "Note", 2, &cell_fields(5, 5));
        assert_eq!(ix.notes.get(&(1, 5, 5)), Some(&2));
        assert!(ix.dimensions.is_empty());
    }
}
