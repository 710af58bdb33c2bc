//! Viewport - cursor and scroll position over a list view
//!
//! Invariant whenever the view is non-empty:
//! `offset <= cursor <= offset + page_height - 1` and `cursor < view_len`.
//! An empty view pins both to 0.

/// Direction of a page move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub cursor: usize,
    pub offset: usize,
}

impl Viewport {
    pub fn new() -> Self {
        Viewport::default()
    }

    /// Move the cursor by `delta` rows, clamped to the view
    pub fn move_cursor(&mut self, delta: isize, view_len: usize, page_height: usize) {
        if view_len == 0 {
            self.reset();
            return;
        }
        let max = (view_len - 1) as isize;
        let target = (self.cursor as isize).saturating_add(delta).clamp(0, max);
        self.cursor = target as usize;
        self.ensure_visible(page_height);
    }

    /// Move the cursor by a full page
    pub fn page_move(&mut self, direction: PageDirection, page_height: usize, view_len: usize) {
        let page = page_height.max(1) as isize;
        let delta = match direction {
            PageDirection::Up => -page,
            PageDirection::Down => page,
        };
        self.move_cursor(delta, view_len, page_height);
    }

    /// Re-establish the invariant after the view or page height changed
    pub fn clamp(&mut self, view_len: usize, page_height: usize) {
        if view_len == 0 {
            self.reset();
            return;
        }
        self.cursor = self.cursor.min(view_len - 1);
        self.ensure_visible(page_height);
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.offset = 0;
    }

    /// Visible index range for a view of `view_len` rows
    pub fn visible_range(&self, view_len: usize, page_height: usize) -> std::ops::Range<usize> {
        let start = self.offset.min(view_len);
        let end = (self.offset + page_height.max(1)).min(view_len);
        start..end
    }

    fn ensure_visible(&mut self, page_height: usize) {
        let height = page_height.max(1);
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + height {
            self.offset = self.cursor + 1 - height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn holds(vp: &Viewport, view_len: usize, page_height: usize) -> bool {
        if view_len == 0 {
            return vp.cursor == 0 && vp.offset == 0;
        }
        vp.offset <= vp.cursor && vp.cursor < vp.offset + page_height && vp.cursor < view_len
    }

    #[test]
    fn test_move_down_scrolls_when_leaving_window() {
        let mut vp = Viewport::new();
        for _ in 0..5 {
            vp.move_cursor(1, 20, 5);
        }
        assert_eq!(vp.cursor, 5);
        assert_eq!(vp.offset, 1);
    }

    #[test]
    fn test_move_up_snaps_offset_to_cursor() {
        let mut vp = Viewport {
            cursor: 10,
            offset: 8,
        };
        vp.move_cursor(-3, 20, 5);
        assert_eq!(vp.cursor, 7);
        assert_eq!(vp.offset, 7);
    }

    #[test]
    fn test_move_clamps_to_bounds() {
        let mut vp = Viewport::new();
        vp.move_cursor(-1, 3, 10);
        assert_eq!(vp.cursor, 0);
        vp.move_cursor(100, 3, 10);
        assert_eq!(vp.cursor, 2);
        assert_eq!(vp.offset, 0);
    }

    #[test]
    fn test_page_moves() {
        let mut vp = Viewport::new();
        vp.page_move(PageDirection::Down, 10, 25);
        assert_eq!((vp.cursor, vp.offset), (10, 1));
        vp.page_move(PageDirection::Down, 10, 25);
        assert_eq!((vp.cursor, vp.offset), (20, 11));
        vp.page_move(PageDirection::Down, 10, 25);
        assert_eq!((vp.cursor, vp.offset), (24, 15));
        vp.page_move(PageDirection::Up, 10, 25);
        assert_eq!((vp.cursor, vp.offset), (14, 14));
        vp.page_move(PageDirection::Up, 10, 25);
        assert_eq!((vp.cursor, vp.offset), (4, 4));
        vp.page_move(PageDirection::Up, 10, 25);
        assert_eq!((vp.cursor, vp.offset), (0, 0));
    }

    #[test]
    fn test_empty_view_pins_cursor() {
        let mut vp = Viewport {
            cursor: 4,
            offset: 2,
        };
        vp.move_cursor(1, 0, 10);
        assert_eq!(vp, Viewport::new());
        vp.page_move(PageDirection::Down, 10, 0);
        assert_eq!(vp, Viewport::new());
    }

    #[test]
    fn test_clamp_after_shorter_view() {
        let mut vp = Viewport {
            cursor: 40,
            offset: 35,
        };
        vp.clamp(12, 10);
        assert_eq!(vp.cursor, 11);
        assert_eq!(vp.offset, 11);
        assert!(holds(&vp, 12, 10));
    }

    #[test]
    fn test_clamp_after_page_shrink() {
        let mut vp = Viewport {
            cursor: 9,
            offset: 0,
        };
        vp.clamp(30, 4);
        assert_eq!(vp.offset, 6);
        assert!(holds(&vp, 30, 4));
    }

    #[test]
    fn test_invariant_over_mixed_sequence() {
        let mut vp = Viewport::new();
        let steps: [(i32, usize, usize); 12] = [
            (1, 50, 7),
            (30, 50, 7),
            (-2, 50, 7),
            (100, 50, 3),
            (-1, 10, 3),
            (5, 10, 1),
            (-7, 10, 1),
            (2, 0, 5),
            (3, 8, 20),
            (-100, 8, 20),
            (4, 8, 2),
            (1, 8, 2),
        ];
        for (i, &(delta, len, height)) in steps.iter().enumerate() {
            if i % 3 == 0 {
                let dir = if delta < 0 {
                    PageDirection::Up
                } else {
                    PageDirection::Down
                };
                vp.page_move(dir, height, len);
            } else {
                vp.clamp(len, height);
                vp.move_cursor(delta as isize, len, height);
            }
            assert!(holds(&vp, len, height), "step {} broke {:?}", i, vp);
        }
    }

    #[test]
    fn test_visible_range() {
        let vp = Viewport {
            cursor: 12,
            offset: 10,
        };
        assert_eq!(vp.visible_range(15, 10), 10..15);
        assert_eq!(vp.visible_range(100, 10), 10..20);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Move(isize),
        Page(PageDirection),
        Clamp,
    }

    fn arb_op() -> impl Strategy<Value = (Op, usize, usize)> {
        let op = prop_oneof![
            (-60isize..60).prop_map(Op::Move),
            Just(Op::Page(PageDirection::Up)),
            Just(Op::Page(PageDirection::Down)),
            Just(Op::Clamp),
        ];
        (op, 0usize..80, 1usize..30)
    }

    proptest! {
        #[test]
        fn test_invariant_over_random_sequences(
            ops in prop::collection::vec(arb_op(), 1..64),
        ) {
            let mut vp = Viewport::new();
            for (op, len, height) in ops {
                match &op {
                    Op::Move(delta) => vp.move_cursor(*delta, len, height),
                    Op::Page(direction) => vp.page_move(*direction, height, len),
                    Op::Clamp => vp.clamp(len, height),
                }
                prop_assert!(holds(&vp, len, height), "{:?} after {:?}", vp, op);
            }
        }
    }
}
