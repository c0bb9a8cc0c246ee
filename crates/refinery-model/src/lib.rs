pub mod data;
pub mod model;
pub mod params;
pub mod report;

pub use data::{
    ConversionUnit, DataError, Distillation, FuelOilRecipe, LubeOilUnit, MaterialKind, ProductRatio,
    RefineryData, YieldTable, BUNDLED_DATA,
};
pub use model::{RefineryModel, Stream};
pub use params::{ParameterOverrides, Parameters};
pub use report::{MaterialQuantity, ProductProfit, RefineryReport, StreamFlow, QUANTITY_EPSILON};
