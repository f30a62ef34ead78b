use std::iter;

use tracing::debug;

use crate::{
    database::{Catalog, DataType, RelationId},
    parser::analyzer::{
        AnalysisContext, AnalyzerError, ColumnPosition, ColumnResolver, ColumnVar, ErrorKind, JoinAliasColumn, RangeEntryKind,
        RelationExpander, ScopeFrame, TypedExpr,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeField {
    pub name: String,
    pub ty: DataType,
    pub typmod: i32,
    pub is_dropped: bool,
}

/// Field layout of a row value. Dropped fields keep their place so field
/// numbers stay stable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowShape {
    pub fields: Vec<ShapeField>,
}

impl RowShape {
    /// 1-based field number and field of a live field.
    pub fn field(&self, name: &str) -> Option<(u32, &ShapeField)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| !f.is_dropped && f.name == name)
            .map(|(i, f)| (i as u32 + 1, f))
    }

    pub fn live_fields(&self) -> impl Iterator<Item = (u32, &ShapeField)> {
        self.fields.iter().enumerate().filter(|(_, f)| !f.is_dropped).map(|(i, f)| (i as u32 + 1, f))
    }
}

/// Works out the row shape of `record`-typed expressions.
///
/// A column of type `record` has no registered layout; its shape is found
/// by walking into whatever defines it (a subquery output, a join alias
/// column, a CTE output) with that definition's query pushed as an extra
/// frame, until a concrete layout turns up.
pub struct RecordResolver;

impl RecordResolver {
    fn undetermined() -> AnalyzerError {
        AnalyzerError::new(ErrorKind::UndeterminedRowShape, "record type has not been registered")
    }

    fn composite_shape(catalog: &dyn Catalog, id: RelationId) -> Result<RowShape, AnalyzerError> {
        let schema = catalog
            .relation(id)
            .ok_or_else(|| AnalyzerError::internal(format!("cache lookup failed for type {id}")))?;
        let fields = schema.columns
            .iter()
            .map(|c| ShapeField { name: c.name.clone(), ty: c.ty.clone(), typmod: c.typmod, is_dropped: c.is_dropped })
            .collect();
        Ok(RowShape { fields })
    }

    fn shape_of_expr(catalog: &dyn Catalog, frames: &[ScopeFrame<'_>], expr: &TypedExpr) -> Result<RowShape, AnalyzerError> {
        match expr.data_type() {
            DataType::Composite(id) => Self::composite_shape(catalog, id),
            DataType::Record => match expr {
                TypedExpr::Column(var) => Self::record_variable_shape(catalog, frames, var),
                TypedExpr::Row { args, field_names } => {
                    let fields = args
                        .iter()
                        .enumerate()
                        .map(|(i, arg)| ShapeField {
                            name: field_names.get(i).cloned().unwrap_or_else(|| format!("f{}", i + 1)),
                            ty: arg.data_type(),
                            typmod: arg.typmod(),
                            is_dropped: false,
                        })
                        .collect();
                    Ok(RowShape { fields })
                }
                TypedExpr::Collate { arg, .. } => Self::shape_of_expr(catalog, frames, arg),
                _ => Err(Self::undetermined()),
            },
            other => AnalyzerError::new(ErrorKind::DatatypeMismatch, format!("type {other} is not composite")).err(),
        }
    }

    /// Shape of a column reference whose type is `record`. `frames` is the
    /// scope chain the reference was resolved in, innermost first.
    fn record_variable_shape(catalog: &dyn Catalog, frames: &[ScopeFrame<'_>], var: &ColumnVar) -> Result<RowShape, AnalyzerError> {
        let level = var.reference.levels_up as usize;
        let entry = frames
            .get(level)
            .and_then(|frame| frame.entry(var.reference.entity_slot))
            .ok_or_else(|| AnalyzerError::internal(format!("invalid range entry slot {}", var.reference.entity_slot)))?;

        let attnum = match var.reference.column_position {
            None => {
                let fields = RelationExpander::exposed_fields(entry, true)?
                    .into_iter()
                    .map(|f| ShapeField { is_dropped: f.name.is_empty(), name: f.name, ty: f.ty, typmod: f.typmod })
                    .collect();
                return Ok(RowShape { fields });
            }
            Some(ColumnPosition::System(_)) => return Err(Self::undetermined()),
            Some(ColumnPosition::User(n)) => n,
        };
        debug!(entry = %entry.display_name, attnum, "resolving record column shape");

        match &entry.kind {
            RangeEntryKind::Subquery { query } => {
                let output = query.output_at(attnum).ok_or_else(|| {
                    AnalyzerError::internal(format!("subquery {} does not have attribute {attnum}", entry.display_name))
                })?;
                let inner: Vec<ScopeFrame<'_>> = iter::once(ScopeFrame::of_query(query))
                    .chain(frames[level..].iter().copied())
                    .collect();
                Self::shape_of_expr(catalog, &inner, &output.expression)
            }
            RangeEntryKind::Join { merged_columns, .. } => {
                let column = (attnum as usize)
                    .checked_sub(1)
                    .and_then(|i| merged_columns.get(i))
                    .ok_or_else(|| AnalyzerError::internal(format!("join {} does not have attribute {attnum}", entry.display_name)))?;
                match column {
                    JoinAliasColumn::Direct(leg_var) => Self::shape_of_expr(catalog, &frames[level..], &TypedExpr::Column(leg_var.clone())),
                    JoinAliasColumn::Merged { .. } => Err(Self::undetermined()),
                }
            }
            RangeEntryKind::CteReference { self_reference: true, .. } => Err(Self::undetermined()),
            RangeEntryKind::CteReference { definition, levels_above, .. } => {
                let query = definition.query.as_ref().ok_or_else(Self::undetermined)?;
                let output = query.output_at(attnum).ok_or_else(|| {
                    AnalyzerError::internal(format!("WITH query {} does not have attribute {attnum}", definition.name))
                })?;
                let outer = frames.get(level + *levels_above as usize..).unwrap_or_default();
                let inner: Vec<ScopeFrame<'_>> = iter::once(ScopeFrame::of_query(query)).chain(outer.iter().copied()).collect();
                Self::shape_of_expr(catalog, &inner, &output.expression)
            }
            RangeEntryKind::BaseRelation { .. } | RangeEntryKind::SetFunction { .. } | RangeEntryKind::Literal { .. } => {
                Err(Self::undetermined())
            }
        }
    }

    /// Row shape of a row-valued expression resolved in the current scope chain.
    pub fn row_shape(ctx: &AnalysisContext, expr: &TypedExpr) -> Result<RowShape, AnalyzerError> {
        let frames = ctx.frames();
        Self::shape_of_expr(ctx.catalog, &frames, expr)
    }

    /// `(arg).name`
    pub fn select_field(ctx: &mut AnalysisContext, arg: TypedExpr, name: &str, location: Option<usize>) -> Result<TypedExpr, AnalyzerError> {
        // a field of a whole-row reference is just a column of that entry
        if let TypedExpr::Column(var) = &arg {
            if var.is_whole_row() {
                let (levels_up, slot) = (var.reference.levels_up, var.reference.entity_slot);
                let entry = ctx.entry(levels_up, slot)?;
                if let Some(position) = ColumnResolver::find_column_in_entry(entry, name, location)? {
                    return ColumnResolver::make_var(ctx, levels_up, slot, position, location).map(TypedExpr::Column);
                }
            }
        }

        let shape = Self::row_shape(ctx, &arg).map_err(|e| e.at(location))?;
        match shape.field(name) {
            Some((field_number, field)) => Ok(TypedExpr::FieldSelect {
                field_name: field.name.clone(),
                ty: field.ty.clone(),
                typmod: field.typmod,
                field_number,
                arg: Box::new(arg),
            }),
            None => AnalyzerError::fail(
                ErrorKind::ColumnNotFound,
                format!("column \"{name}\" not found in data type {}", arg.data_type()),
                location,
            ),
        }
    }
}
