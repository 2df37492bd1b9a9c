use serde::{Deserialize, Serialize};

/// Objeto detectado, con esquinas normalizadas a `[0, 1]` de la imagen original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl Detection {
    pub fn area(&self) -> f32 {
        (self.xmax - self.xmin) * (self.ymax - self.ymin)
    }

    /// Intersección sobre unión. Cero para cajas disjuntas o unión vacía.
    pub fn iou(&self, other: &Detection) -> f32 {
        let x1 = self.xmin.max(other.xmin);
        let y1 = self.ymin.max(other.ymin);
        let x2 = self.xmax.min(other.xmax);
        let y2 = self.ymax.min(other.ymax);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

#[cfg(test)]
pub(crate) fn det(label: &str, score: f32, b: [f32; 4]) -> Detection {
    Detection {
        label: label.to_string(),
        score,
        xmin: b[0],
        ymin: b[1],
        xmax: b[2],
        ymax: b[3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_is_symmetric() {
        let a = det("car", 0.9, [0.1, 0.1, 0.5, 0.5]);
        let b = det("car", 0.7, [0.15, 0.15, 0.52, 0.52]);
        assert_eq!(a.iou(&b), b.iou(&a));
        assert!((a.iou(&b) - 0.7024).abs() < 1e-3);
    }

    #[test]
    fn iou_with_itself_is_one() {
        let a = det("dog", 0.5, [0.2, 0.3, 0.6, 0.9]);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_and_touching_boxes_have_zero_iou() {
        let a = det("a", 0.5, [0.0, 0.0, 0.2, 0.2]);
        let b = det("b", 0.5, [0.5, 0.5, 0.9, 0.9]);
        let touching = det("c", 0.5, [0.2, 0.0, 0.4, 0.2]);
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(a.iou(&touching), 0.0);
    }

    #[test]
    fn degenerate_boxes_have_zero_iou() {
        let a = det("a", 0.5, [0.3, 0.3, 0.3, 0.3]);
        assert_eq!(a.iou(&a), 0.0);
    }
}
