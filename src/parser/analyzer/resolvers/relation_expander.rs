use std::sync::Arc;

use tracing::debug;

use crate::{
    database::{DataType, FunctionSignature, RelationSchema, ResultShape, TYPMOD_UNSPECIFIED},
    parser::{
        analyzer::{AnalysisContext, AnalyzedQuery, AnalyzerError, ColumnPosition, CteDef, DeclaredColumn, ErrorKind, JoinAliasColumn, RangeEntry, RangeEntryKind, TypedExpr},
        ast::{Alias, ColumnDef, JoinType},
    },
};

/// A column as exposed by a range entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposedColumn {
    pub name: String,
    pub position: ColumnPosition,
    pub ty: DataType,
    pub typmod: i32,
}

/// Builds range entries of each kind and answers what columns they expose.
pub struct RelationExpander;

impl RelationExpander {
    /// Overlay user column aliases onto the live names, in order.
    fn apply_aliases(names: &mut [String], alias: Option<&Alias>, display_name: &str, what: &str) -> Result<(), AnalyzerError> {
        let Some(alias) = alias else { return Ok(()) };
        let live = names.iter().filter(|n| !n.is_empty()).count();
        if alias.columns.len() > live {
            return AnalyzerError::new(
                ErrorKind::ColumnAliasMismatch,
                format!("{what} \"{display_name}\" has {live} columns available but {} columns specified", alias.columns.len()),
            ).err();
        }
        let mut aliases = alias.columns.iter();
        for name in names.iter_mut().filter(|n| !n.is_empty()) {
            match aliases.next() {
                Some(a) => *name = a.clone(),
                None => break,
            }
        }
        Ok(())
    }

    pub fn base_relation(schema: Arc<RelationSchema>, alias: Option<&Alias>) -> Result<RangeEntry, AnalyzerError> {
        let display_name = alias.map(|a| a.name.clone()).unwrap_or_else(|| schema.name.clone());
        let mut names: Vec<String> = schema.columns
            .iter()
            .map(|c| if c.is_dropped { String::new() } else { c.name.clone() })
            .collect();
        Self::apply_aliases(&mut names, alias, &display_name, "table")?;

        let mut entry = RangeEntry::new(
            RangeEntryKind::BaseRelation { schema },
            display_name,
            alias.map(|a| a.name.clone()),
            names,
        );
        // reading any part of a relation needs read access to it
        entry.requires_read = true;
        Ok(entry)
    }

    pub fn subquery(query: AnalyzedQuery, alias: &Alias, lateral: bool) -> Result<RangeEntry, AnalyzerError> {
        let mut names = query.output_names();
        Self::apply_aliases(&mut names, Some(alias), &alias.name, "table")?;
        let mut entry = RangeEntry::new(
            RangeEntryKind::Subquery { query: Box::new(query) },
            alias.name.clone(),
            Some(alias.name.clone()),
            names,
        );
        entry.lateral = lateral;
        Ok(entry)
    }

    /// Entry for a set operation arm; never placed in a namespace.
    pub(crate) fn set_operation_arm(query: AnalyzedQuery, name: &str) -> RangeEntry {
        let names = query.output_names();
        RangeEntry::new(RangeEntryKind::Subquery { query: Box::new(query) }, name.to_string(), None, names)
    }

    /// Function in FROM. Scalar results expose one column, composite results
    /// their fields, and `record` results the caller's column definitions.
    pub fn set_function(
        ctx: &AnalysisContext,
        call: TypedExpr,
        function: FunctionSignature,
        alias: Option<&Alias>,
        column_defs: &[ColumnDef],
        lateral: bool,
    ) -> Result<RangeEntry, AnalyzerError> {
        let display_name = alias.map(|a| a.name.clone()).unwrap_or_else(|| function.name.clone());
        let is_record = function.result == ResultShape::GenericRecord;
        if !column_defs.is_empty() && !is_record {
            return AnalyzerError::new(
                ErrorKind::ColumnDefinitionList,
                "a column definition list is only allowed for functions returning \"record\"",
            ).err();
        }

        let columns = match &function.result {
            ResultShape::Scalar(ty) => {
                let name = match alias.map(|a| a.columns.as_slice()) {
                    Some([single]) => single.clone(),
                    Some(cols) if cols.len() > 1 => {
                        return AnalyzerError::new(
                            ErrorKind::ColumnAliasMismatch,
                            format!("too many column aliases specified for function {}", function.name),
                        ).err();
                    }
                    _ => function.out_param_name.clone().unwrap_or_else(|| display_name.clone()),
                };
                vec![DeclaredColumn::new(&name, ty.clone(), TYPMOD_UNSPECIFIED)]
            }
            ResultShape::Composite(id) => {
                let schema = ctx.catalog.relation(*id).ok_or_else(|| {
                    AnalyzerError::new(
                        ErrorKind::UnsupportedReturnType,
                        format!("function \"{}\" in FROM has unsupported return type", function.name),
                    )
                })?;
                let mut columns: Vec<DeclaredColumn> = schema.columns
                    .iter()
                    .map(|c| DeclaredColumn {
                        name: if c.is_dropped { String::new() } else { c.name.clone() },
                        ty: c.ty.clone(),
                        typmod: c.typmod,
                        is_dropped: c.is_dropped,
                    })
                    .collect();
                let mut names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
                Self::apply_aliases(&mut names, alias, &display_name, "table")?;
                for (col, name) in columns.iter_mut().zip(names) {
                    col.name = name;
                }
                columns
            }
            ResultShape::GenericRecord => {
                if column_defs.is_empty() {
                    return AnalyzerError::new(
                        ErrorKind::ColumnDefinitionList,
                        "a column definition list is required for functions returning \"record\"",
                    ).err();
                }
                let mut columns = Vec::with_capacity(column_defs.len());
                for def in column_defs {
                    let (ty, typmod) = ctx.catalog.lookup_type(&def.type_name).ok_or_else(|| {
                        AnalyzerError::new(ErrorKind::TypeNotFound, format!("type \"{}\" does not exist", def.type_name))
                            .at(def.type_name.location)
                    })?;
                    columns.push(DeclaredColumn::new(&ctx.config.identifier(&def.name), ty, typmod));
                }
                columns
            }
        };

        let names = columns.iter().map(|c| c.name.clone()).collect();
        let mut entry = RangeEntry::new(
            RangeEntryKind::SetFunction { call: Box::new(call), function, columns },
            display_name,
            alias.map(|a| a.name.clone()),
            names,
        );
        entry.lateral = lateral;
        Ok(entry)
    }

    /// VALUES list. Rows must share one width; each column takes the common
    /// supertype of its values and keeps a typmod only when all rows agree.
    pub fn values(rows: Vec<Vec<TypedExpr>>, alias: Option<&Alias>) -> Result<RangeEntry, AnalyzerError> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return AnalyzerError::new(ErrorKind::ValuesShapeMismatch, "VALUES lists must all be the same length").err();
        }

        let mut columns = Vec::with_capacity(width);
        for col in 0..width {
            let mut ty = DataType::Unknown;
            let mut typmod = rows[0][col].typmod();
            for row in &rows {
                let value_ty = row[col].data_type();
                ty = DataType::promote(&ty, &value_ty).ok_or_else(|| {
                    AnalyzerError::new(ErrorKind::DatatypeMismatch, format!("VALUES types {ty} and {value_ty} cannot be matched"))
                })?;
                if row[col].typmod() != typmod {
                    typmod = TYPMOD_UNSPECIFIED;
                }
            }
            columns.push(DeclaredColumn::new(&format!("column{}", col + 1), ty, typmod));
        }

        let display_name = alias.map(|a| a.name.clone()).unwrap_or_else(|| "*VALUES*".to_string());
        let mut names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        Self::apply_aliases(&mut names, alias, &display_name, "VALUES list")?;

        Ok(RangeEntry::new(
            RangeEntryKind::Literal { rows, columns },
            display_name,
            alias.map(|a| a.name.clone()),
            names,
        ))
    }

    pub fn join(
        kind: JoinType,
        (left, right): (u32, u32),
        mut names: Vec<String>,
        merged_columns: Vec<JoinAliasColumn>,
        quals: Option<TypedExpr>,
        alias: Option<&Alias>,
    ) -> Result<RangeEntry, AnalyzerError> {
        let display_name = alias.map(|a| a.name.clone()).unwrap_or_else(|| "unnamed_join".to_string());
        Self::apply_aliases(&mut names, alias, &display_name, "join expression")?;
        Ok(RangeEntry::new(
            RangeEntryKind::Join { kind, left, right, merged_columns, quals: quals.map(Box::new) },
            display_name,
            alias.map(|a| a.name.clone()),
            names,
        ))
    }

    /// Reference to a CTE; a definition still under analysis makes it a self
    /// reference, which is only allowed once its column shape is known.
    pub fn cte_reference(definition: Arc<CteDef>, levels_above: u32, alias: Option<&Alias>) -> Result<RangeEntry, AnalyzerError> {
        if definition.columns.is_none() {
            return Err(Self::not_ready(&definition));
        }
        let display_name = alias.map(|a| a.name.clone()).unwrap_or_else(|| definition.name.clone());
        let mut names: Vec<String> = definition.columns
            .as_ref()
            .map(|cols| cols.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();
        Self::apply_aliases(&mut names, alias, &display_name, "table")?;
        let self_reference = definition.is_in_progress();
        debug!(cte = %definition.name, levels_above, self_reference, "referencing CTE");
        Ok(RangeEntry::new(
            RangeEntryKind::CteReference { definition, levels_above, self_reference },
            display_name,
            alias.map(|a| a.name.clone()),
            names,
        ))
    }

    fn not_ready(def: &CteDef) -> AnalyzerError {
        AnalyzerError::new(
            ErrorKind::RecursiveSelfReferenceNotReady,
            format!("recursive reference to query \"{}\" must not appear within its non-recursive term", def.name),
        )
    }

    /// Type of one column of an entry.
    pub fn column_type(entry: &RangeEntry, position: ColumnPosition) -> Result<(DataType, i32), AnalyzerError> {
        let attnum = match position {
            ColumnPosition::System(sys) => return Ok((sys.data_type(), TYPMOD_UNSPECIFIED)),
            ColumnPosition::User(n) => n,
        };
        let missing = || AnalyzerError::internal(format!("{} {} does not have attribute {attnum}", entry.kind_name(), entry.display_name));
        let idx = (attnum as usize).checked_sub(1).ok_or_else(missing)?;

        match &entry.kind {
            RangeEntryKind::BaseRelation { schema } => {
                let col = schema.column(attnum).ok_or_else(missing)?;
                Ok((col.ty.clone(), col.typmod))
            }
            RangeEntryKind::Subquery { query } => {
                let out = query.output_at(attnum).ok_or_else(missing)?;
                Ok((out.expression.data_type(), out.expression.typmod()))
            }
            RangeEntryKind::Join { merged_columns, .. } => {
                Ok(merged_columns.get(idx).ok_or_else(missing)?.data_type())
            }
            RangeEntryKind::SetFunction { columns, .. } | RangeEntryKind::Literal { columns, .. } => {
                let col = columns.get(idx).ok_or_else(missing)?;
                Ok((col.ty.clone(), col.typmod))
            }
            RangeEntryKind::CteReference { definition, .. } => {
                let columns = definition.columns.as_ref().ok_or_else(|| Self::not_ready(definition))?;
                let col = columns.get(idx).ok_or_else(missing)?;
                Ok((col.ty.clone(), col.typmod))
            }
        }
    }

    /// Columns an entry exposes, with types. Dropped columns are skipped
    /// unless `include_dropped`, but positions always count them.
    pub fn exposed_fields(entry: &RangeEntry, include_dropped: bool) -> Result<Vec<ExposedColumn>, AnalyzerError> {
        if let RangeEntryKind::CteReference { definition, .. } = &entry.kind {
            if definition.columns.is_none() {
                return Err(Self::not_ready(definition));
            }
        }
        let mut fields = Vec::with_capacity(entry.column_names.len());
        for (i, name) in entry.column_names.iter().enumerate() {
            let position = ColumnPosition::User(i as u32 + 1);
            if name.is_empty() {
                if include_dropped {
                    fields.push(ExposedColumn { name: String::new(), position, ty: DataType::Unknown, typmod: TYPMOD_UNSPECIFIED });
                }
                continue;
            }
            let (ty, typmod) = Self::column_type(entry, position)?;
            fields.push(ExposedColumn { name: name.clone(), position, ty, typmod });
        }
        Ok(fields)
    }

    /// Names and positions of the columns an entry exposes.
    pub fn expose_columns(entry: &RangeEntry, include_dropped: bool) -> Result<(Vec<String>, Vec<ColumnPosition>), AnalyzerError> {
        Ok(Self::exposed_fields(entry, include_dropped)?
            .into_iter()
            .map(|f| (f.name, f.position))
            .unzip())
    }

    /// Type of a whole-row reference to the entry.
    pub fn whole_row_type(entry: &RangeEntry) -> DataType {
        match &entry.kind {
            RangeEntryKind::BaseRelation { schema } => DataType::Composite(schema.id),
            RangeEntryKind::SetFunction { function, .. } => function.result_type(),
            RangeEntryKind::Subquery { .. }
            | RangeEntryKind::Join { .. }
            | RangeEntryKind::Literal { .. }
            | RangeEntryKind::CteReference { .. } => DataType::Record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::{ColumnInfo, FunctionId, MemoryCatalog, RelationId, RelationKind},
        parser::ast::{Literal, TypeName},
    };

    fn schema_with_dropped() -> Arc<RelationSchema> {
        Arc::new(RelationSchema {
            id: RelationId(7),
            namespace: "public".into(),
            name: "people".into(),
            kind: RelationKind::Table,
            columns: vec![
                ColumnInfo::new("id", DataType::Integer),
                ColumnInfo { is_dropped: true, ..ColumnInfo::new("legacy", DataType::Text) },
                ColumnInfo::new("name", DataType::Text),
            ],
            has_oids: false,
        })
    }

    fn int(value: i64) -> TypedExpr {
        TypedExpr::Const { value: Literal::Int(value), ty: DataType::Integer }
    }

    fn text(value: &str) -> TypedExpr {
        TypedExpr::Const { value: Literal::String(value.into()), ty: DataType::Text }
    }

    #[test]
    fn base_relation_keeps_placeholders_for_dropped_columns() {
        let entry = RelationExpander::base_relation(schema_with_dropped(), None).unwrap();
        assert_eq!(entry.column_names, vec!["id", "", "name"]);
        assert!(entry.requires_read);

        let (names, positions) = RelationExpander::expose_columns(&entry, false).unwrap();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(positions, vec![ColumnPosition::User(1), ColumnPosition::User(3)]);

        let (all, _) = RelationExpander::expose_columns(&entry, true).unwrap();
        assert_eq!(all.len(), entry.column_names.len());
    }

    #[test]
    fn column_aliases_skip_dropped_columns() {
        let alias = Alias::with_columns("p", &["pid", "pname"]);
        let entry = RelationExpander::base_relation(schema_with_dropped(), Some(&alias)).unwrap();
        assert_eq!(entry.display_name, "p");
        assert_eq!(entry.column_names, vec!["pid", "", "pname"]);
    }

    #[test]
    fn too_many_column_aliases_fail() {
        let alias = Alias::with_columns("p", &["a", "b", "c"]);
        let err = RelationExpander::base_relation(schema_with_dropped(), Some(&alias)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ColumnAliasMismatch);
        assert_eq!(err.message, "table \"p\" has 2 columns available but 3 columns specified");
    }

    #[test]
    fn values_promote_types_and_keep_typmod_only_when_identical() {
        let varchar = |len: i32| TypedExpr::Cast { arg: Box::new(text("x")), ty: DataType::Varchar, typmod: DataType::length_typmod(len) };
        let rows = vec![
            vec![int(1), varchar(5), varchar(5)],
            vec![TypedExpr::Const { value: Literal::Int(1 << 40), ty: DataType::BigInt }, varchar(5), varchar(9)],
        ];
        let entry = RelationExpander::values(rows, None).unwrap();
        assert_eq!(entry.display_name, "*VALUES*");
        assert_eq!(entry.column_names, vec!["column1", "column2", "column3"]);

        let fields = RelationExpander::exposed_fields(&entry, false).unwrap();
        assert_eq!(fields[0].ty, DataType::BigInt);
        assert_eq!(fields[1].typmod, DataType::length_typmod(5));
        assert_eq!(fields[2].typmod, TYPMOD_UNSPECIFIED);
    }

    #[test]
    fn values_rows_must_share_width() {
        let err = RelationExpander::values(vec![vec![int(1)], vec![int(1), int(2)]], None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValuesShapeMismatch);
    }

    fn scalar_fn(out_param: Option<&str>) -> FunctionSignature {
        FunctionSignature {
            id: FunctionId(1),
            name: "next_id".into(),
            result: ResultShape::Scalar(DataType::BigInt),
            out_param_name: out_param.map(str::to_string),
            returns_set: false,
        }
    }

    fn call(f: &FunctionSignature) -> TypedExpr {
        TypedExpr::FuncCall { function: f.id, name: f.name.clone(), args: vec![], ty: f.result_type(), returns_set: f.returns_set }
    }

    #[test]
    fn scalar_function_column_naming_order() {
        let catalog = MemoryCatalog::new();
        let ctx = AnalysisContext::new(&catalog);

        let f = scalar_fn(Some("value"));
        let aliased = Alias::with_columns("g", &["v"]);
        let e = RelationExpander::set_function(&ctx, call(&f), f.clone(), Some(&aliased), &[], false).unwrap();
        assert_eq!(e.column_names, vec!["v"]);

        let e = RelationExpander::set_function(&ctx, call(&f), f.clone(), Some(&Alias::new("g")), &[], false).unwrap();
        assert_eq!(e.column_names, vec!["value"]);

        let f = scalar_fn(None);
        let e = RelationExpander::set_function(&ctx, call(&f), f.clone(), Some(&Alias::new("g")), &[], false).unwrap();
        assert_eq!(e.column_names, vec!["g"]);

        let e = RelationExpander::set_function(&ctx, call(&f), f.clone(), None, &[], false).unwrap();
        assert_eq!(e.column_names, vec!["next_id"]);

        let two = Alias::with_columns("g", &["a", "b"]);
        let err = RelationExpander::set_function(&ctx, call(&f), f, Some(&two), &[], false).unwrap_err();
        assert_eq!(err.message, "too many column aliases specified for function next_id");
    }

    #[test]
    fn column_definition_list_is_required_exactly_for_record_functions() {
        let catalog = MemoryCatalog::new();
        let ctx = AnalysisContext::new(&catalog);
        let defs = vec![ColumnDef::new("k", TypeName::new("text")), ColumnDef::new("v", TypeName::new("int"))];

        let f = scalar_fn(None);
        let err = RelationExpander::set_function(&ctx, call(&f), f, None, &defs, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ColumnDefinitionList);

        let record = FunctionSignature { result: ResultShape::GenericRecord, ..scalar_fn(None) };
        let err = RelationExpander::set_function(&ctx, call(&record), record.clone(), None, &[], false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ColumnDefinitionList);

        let entry = RelationExpander::set_function(&ctx, call(&record), record, None, &defs, false).unwrap();
        let fields = RelationExpander::exposed_fields(&entry, false).unwrap();
        assert_eq!(fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["k", "v"]);
        assert_eq!(fields[1].ty, DataType::Integer);
    }

    #[test]
    fn self_reference_needs_a_known_shape() {
        let def = CteDef::pending("walk", &[], true, None);
        let err = RelationExpander::cte_reference(Arc::new(def.clone()), 0, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursiveSelfReferenceNotReady);
        assert_eq!(err.message, "recursive reference to query \"walk\" must not appear within its non-recursive term");

        let shaped = CteDef { columns: Some(vec![DeclaredColumn::new("n", DataType::Integer, TYPMOD_UNSPECIFIED)]), ..def };
        let entry = RelationExpander::cte_reference(Arc::new(shaped), 0, Some(&Alias::new("w"))).unwrap();
        assert!(matches!(entry.kind, RangeEntryKind::CteReference { self_reference: true, .. }));
        assert_eq!(entry.display_name, "w");
        assert_eq!(RelationExpander::exposed_fields(&entry, false).unwrap()[0].name, "n");
    }
}
