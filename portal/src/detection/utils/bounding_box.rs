use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub xmin: u32,
    pub xmax: u32,
    pub ymin: u32,
    pub ymax: u32,
    pub name: String,
    pub confidence: f64,
}

impl BoundingBox {
    //[center-x, center-y, width, height], the format used by the result listing.
    pub fn xywh(&self) -> [u32; 4] {
        let width = self.xmax.saturating_sub(self.xmin);
        let height = self.ymax.saturating_sub(self.ymin);
        [self.xmin + width / 2, self.ymin + height / 2, width, height]
    }
}
