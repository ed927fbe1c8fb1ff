use burn::tensor::{Device, Tensor};
use wasm_bindgen::prelude::*;

use crate::{
    fusion::{FireGan, FireGanConfig},
    utils::{rgb_to_tensor, tensor_to_rgb},
    MyBackend,
};

#[wasm_bindgen]
pub struct Fuser {
    model: FireGan<MyBackend>,
    device: Device<MyBackend>,
    height: usize,
    width: usize,
}

#[wasm_bindgen]
impl Fuser {
    #[wasm_bindgen(constructor)]
    pub fn new(height: usize, width: usize) -> Result<Fuser, JsValue> {
        let device = Default::default();
        let model = FireGanConfig::new()
            .with_height(height)
            .with_width(width)
            .init(&device)
            .map_err(to_js)?;

        Ok(Self {
            model,
            device,
            height,
            width,
        })
    }

    /// Replaces the random initial weights with `g1.mpk` / `g2.mpk` record bytes.
    #[wasm_bindgen(js_name = loadWeights)]
    pub fn load_weights(self, g1: Vec<u8>, g2: Vec<u8>) -> Result<Fuser, JsValue> {
        let model = self.model.load_bytes(g1, g2, &self.device).map_err(to_js)?;

        Ok(Self { model, ..self })
    }

    /// Fuses two interleaved RGB buffers of `height * width * 3` bytes.
    #[wasm_bindgen]
    pub fn fuse(&self, visible: Vec<u8>, infrared: Vec<u8>) -> Result<Vec<u8>, JsValue> {
        let visible: Tensor<MyBackend, 4> =
            rgb_to_tensor(visible, self.height, self.width, &self.device)
                .map_err(to_js)?
                .unsqueeze();
        let infrared: Tensor<MyBackend, 4> =
            rgb_to_tensor(infrared, self.height, self.width, &self.device)
                .map_err(to_js)?
                .unsqueeze();

        let fused = self.model.fuse(visible, infrared).map_err(to_js)?;

        Ok(tensor_to_rgb(fused.squeeze(0)))
    }
}

fn to_js(err: crate::FireGanError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
