//! Typed array and group nodes on top of `zarrs`

use std::num::NonZeroU64;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use zarrs::array::chunk_grid::ChunkGrid;
use zarrs::array::{Array, ArrayBuilder, DataType, Element, ElementOwned, FillValue};
use zarrs::group::{Group, GroupBuilder};
use zarrs::storage::ReadableWritableListableStorage;

use crate::error::{Result, SpatialError};
use crate::layers::Column;

pub(crate) type Store = ReadableWritableListableStorage;

/// Sub-group holding the category labels of categorical columns
pub(crate) const CATEGORIES_GROUP: &str = "__categories";

/// Element types the store writes
pub(crate) trait Scalar: Element + ElementOwned {
    fn data_type() -> DataType;
    fn fill_value() -> FillValue;
}

macro_rules! numeric_scalar {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                fn data_type() -> DataType {
                    DataType::$dt
                }
                fn fill_value() -> FillValue {
                    FillValue::from(<$ty>::default())
                }
            }
        )*
    };
}

numeric_scalar!(
    u8 => UInt8,
    u16 => UInt16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);

impl Scalar for String {
    fn data_type() -> DataType {
        DataType::String
    }
    fn fill_value() -> FillValue {
        FillValue::from("")
    }
}

fn chunk_grid(chunks: &[u64]) -> ChunkGrid {
    let edges: Vec<NonZeroU64> = chunks
        .iter()
        .map(|&c| NonZeroU64::new(c).unwrap_or(NonZeroU64::MIN))
        .collect();
    ChunkGrid::from(edges)
}

/// Write an array with an explicit chunk shape
pub(crate) fn write_array<T: Scalar>(
    store: &Store,
    path: &str,
    data: &[T],
    shape: &[u64],
    chunks: &[u64],
) -> Result<()> {
    let array = ArrayBuilder::new(
        shape.to_vec(),
        T::data_type(),
        chunk_grid(chunks),
        T::fill_value(),
    )
    .build(store.clone(), path)
    .map_err(|e| SpatialError::store_write(path, e))?;
    array
        .store_metadata()
        .map_err(|e| SpatialError::store_write(path, e))?;

    if !data.is_empty() {
        array
            .store_array_subset_elements::<T>(&array.subset_all(), data)
            .map_err(|e| SpatialError::store_write(path, e))?;
    }
    Ok(())
}

/// Write an array stored as a single chunk
pub(crate) fn write_whole<T: Scalar>(
    store: &Store,
    path: &str,
    data: &[T],
    shape: &[u64],
) -> Result<()> {
    write_array(store, path, data, shape, shape)
}

/// Read every element of an array along with its shape
pub(crate) fn read_array<T: Scalar>(store: &Store, path: &str) -> Result<(Vec<T>, Vec<u64>)> {
    let array = Array::open(store.clone(), path).map_err(|e| SpatialError::store_read(path, e))?;
    let shape = array.shape().to_vec();

    if array.data_type() != &T::data_type() {
        return Err(SpatialError::store_read(
            path,
            format!(
                "expected {:?} elements, found {:?}",
                T::data_type(),
                array.data_type()
            ),
        ));
    }
    if shape.iter().product::<u64>() == 0 {
        return Ok((Vec::new(), shape));
    }

    let data = array
        .retrieve_array_subset_elements::<T>(&array.subset_all())
        .map_err(|e| SpatialError::store_read(path, e))?;
    Ok((data, shape))
}

/// Read a 2D array as rows
pub(crate) fn read_rows(store: &Store, path: &str) -> Result<Vec<Vec<f64>>> {
    let (data, shape) = read_array::<f64>(store, path)?;
    match shape.as_slice() {
        [n, 0] => Ok(vec![Vec::new(); *n as usize]),
        [_, width] => Ok(data.chunks(*width as usize).map(<[f64]>::to_vec).collect()),
        other => Err(SpatialError::store_read(
            path,
            format!("expected a 2D array, found shape {other:?}"),
        )),
    }
}

/// Write a group node with attributes
pub(crate) fn write_group<A: Serialize>(store: &Store, path: &str, attributes: &A) -> Result<()> {
    let mut builder = GroupBuilder::new();
    builder.attributes(to_attributes(path, attributes)?);
    let group = builder
        .build(store.clone(), path)
        .map_err(|e| SpatialError::store_write(path, e))?;
    group
        .store_metadata()
        .map_err(|e| SpatialError::store_write(path, e))
}

/// Read and decode a group's attributes
pub(crate) fn read_group<A: DeserializeOwned>(store: &Store, path: &str) -> Result<A> {
    let group = Group::open(store.clone(), path).map_err(|e| SpatialError::store_read(path, e))?;
    serde_json::from_value(Value::Object(group.attributes().clone()))
        .map_err(|e| SpatialError::store_read(path, e))
}

fn to_attributes<A: Serialize>(path: &str, attributes: &A) -> Result<Map<String, Value>> {
    match serde_json::to_value(attributes)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(SpatialError::store_write(
            path,
            format!("attributes must be a JSON object, got {other}"),
        )),
    }
}

/// Write one attribute column under `group`
pub(crate) fn write_column(store: &Store, group: &str, name: &str, column: &Column) -> Result<()> {
    let path = format!("{group}/{name}");
    let len = [column.len() as u64];
    match column {
        Column::Float(values) => write_whole(store, &path, values, &len),
        Column::Int(values) => write_whole(store, &path, values, &len),
        Column::Str(values) => write_whole(store, &path, values, &len),
        Column::Categorical { codes, categories } => {
            write_whole(store, &path, codes, &len)?;
            let categories_group = format!("{group}/{CATEGORIES_GROUP}");
            write_group(store, &categories_group, &())?;
            write_whole(
                store,
                &format!("{categories_group}/{name}"),
                categories,
                &[categories.len() as u64],
            )
        }
    }
}

/// Read one attribute column written by [`write_column`]
pub(crate) fn read_column(store: &Store, group: &str, name: &str, type_name: &str) -> Result<Column> {
    let path = format!("{group}/{name}");
    match type_name {
        "float64" => Ok(Column::Float(read_array(store, &path)?.0)),
        "int64" => Ok(Column::Int(read_array(store, &path)?.0)),
        "string" => Ok(Column::Str(read_array(store, &path)?.0)),
        "categorical" => {
            let (codes, _) = read_array::<i32>(store, &path)?;
            let (categories, _) =
                read_array::<String>(store, &format!("{group}/{CATEGORIES_GROUP}/{name}"))?;
            Column::categorical(codes, categories)
        }
        other => Err(SpatialError::store_read(
            path,
            format!("unknown column type '{other}'"),
        )),
    }
}
