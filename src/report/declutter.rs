//! Label placement for scatter plots.
//!
//! Labels start just above-right of their point and are pushed apart
//! until no two boxes overlap or the iteration budget runs out. Each
//! label keeps a leader line back to its point, so moving it is harmless.

/// A label box in pixel space. `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LabelBox {
    fn overlap(&self, other: &LabelBox) -> Option<(f64, f64)> {
        let dx = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let dy = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if dx > 0.0 && dy > 0.0 {
            Some((dx, dy))
        } else {
            None
        }
    }

    fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Width of a text label, estimated from its length.
pub fn estimate_width(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * 0.6
}

const MAX_ITERATIONS: usize = 200;
const OFFSET: f64 = 6.0;

/// Place labels for `anchors` (pixel positions of the points) inside
/// `bounds` = (left, top, right, bottom). Returns one box per anchor.
pub fn place_labels(
    anchors: &[(f64, f64)],
    sizes: &[(f64, f64)],
    bounds: (f64, f64, f64, f64),
) -> Vec<LabelBox> {
    let mut boxes: Vec<LabelBox> = anchors
        .iter()
        .zip(sizes)
        .map(|(&(ax, ay), &(width, height))| LabelBox {
            x: ax + OFFSET,
            y: ay - OFFSET - height,
            width,
            height,
        })
        .collect();

    for b in boxes.iter_mut() {
        clamp(b, bounds);
    }

    for _ in 0..MAX_ITERATIONS {
        let mut moved = false;
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                let Some((dx, dy)) = boxes[i].overlap(&boxes[j]) else {
                    continue;
                };
                moved = true;
                let (ci, cj) = (boxes[i].center(), boxes[j].center());
                // Separate along the axis with the smaller overlap.
                if dx < dy {
                    let shift = dx / 2.0 + 0.5;
                    let sign = if ci.0 < cj.0 || (ci.0 == cj.0 && i < j) { -1.0 } else { 1.0 };
                    boxes[i].x += sign * shift;
                    boxes[j].x -= sign * shift;
                } else {
                    let shift = dy / 2.0 + 0.5;
                    let sign = if ci.1 < cj.1 || (ci.1 == cj.1 && i < j) { -1.0 } else { 1.0 };
                    boxes[i].y += sign * shift;
                    boxes[j].y -= sign * shift;
                }
                clamp(&mut boxes[i], bounds);
                clamp(&mut boxes[j], bounds);
            }
        }
        if !moved {
            break;
        }
    }

    boxes
}

fn clamp(b: &mut LabelBox, (left, top, right, bottom): (f64, f64, f64, f64)) {
    b.x = b.x.min(right - b.width).max(left);
    b.y = b.y.min(bottom - b.height).max(top);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any_overlap(boxes: &[LabelBox]) -> bool {
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                if boxes[i].overlap(&boxes[j]).is_some() {
                    return true;
                }
            }
        }
        false
    }

    #[test]
    fn test_single_label_sits_above_right() {
        let boxes = place_labels(&[(100.0, 100.0)], &[(40.0, 12.0)], (0.0, 0.0, 500.0, 500.0));
        assert_eq!(boxes[0].x, 106.0);
        assert_eq!(boxes[0].y, 82.0);
    }

    #[test]
    fn test_coincident_labels_are_separated() {
        let anchors = vec![(200.0, 200.0); 5];
        let sizes = vec![(60.0, 12.0); 5];
        let boxes = place_labels(&anchors, &sizes, (0.0, 0.0, 800.0, 600.0));
        assert!(!any_overlap(&boxes));
    }

    #[test]
    fn test_labels_stay_in_bounds() {
        let anchors = vec![(790.0, 5.0), (795.0, 8.0)];
        let sizes = vec![(50.0, 12.0), (50.0, 12.0)];
        let boxes = place_labels(&anchors, &sizes, (0.0, 0.0, 800.0, 600.0));
        for b in &boxes {
            assert!(b.x >= 0.0 && b.x + b.width <= 800.0);
            assert!(b.y >= 0.0 && b.y + b.height <= 600.0);
        }
        assert!(!any_overlap(&boxes));
    }

    #[test]
    fn test_estimate_width() {
        assert_eq!(estimate_width("nucleus", 10.0), 42.0);
    }
}
