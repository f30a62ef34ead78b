#[cfg(test)]
pub mod fixtures {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{
        database::{AnalyzerConfig, Catalog, ColumnInfo, DataType, HintMode, MemoryCatalog, RelationKind, ResultShape},
        parser::{
            analyzer::{AnalyzedQuery, AnalyzerError, ColumnOrigin, ColumnPosition, ErrorKind, QueryAnalyzer, RelationExpander, SortKey, TypedExpr},
            ast::{Alias, CommonTableExpr, FromItem, JoinQuals, JoinType, QualifiedName, RawExpr, ResTarget, SelectStmt, SetOperator, TypeName},
        },
    };

    pub fn seed_catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.create_table("t1", vec![ColumnInfo::new("a", DataType::Integer), ColumnInfo::new("b", DataType::Text)]);
        catalog.create_table("t2", vec![ColumnInfo::new("a", DataType::Integer), ColumnInfo::new("c", DataType::Date)]);
        catalog.create_table("x", vec![ColumnInfo::new("a", DataType::Integer), ColumnInfo::new("z", DataType::Text)]);
        let people = catalog.create_table("people", vec![
            ColumnInfo::new("id", DataType::Integer),
            ColumnInfo::new("nickname", DataType::Text),
            ColumnInfo::new("name", DataType::Varchar).with_typmod(DataType::length_typmod(40)),
        ]);
        catalog.drop_column(people, "nickname");
        catalog.create_relation("sales", "t", RelationKind::Table, vec![ColumnInfo::new("a", DataType::Integer)]);
        catalog.create_relation("archive", "t", RelationKind::Table, vec![ColumnInfo::new("a", DataType::Integer)]);
        catalog.create_function("lower", ResultShape::Scalar(DataType::Text), None, false);
        catalog.create_function("generate_series", ResultShape::Scalar(DataType::Integer), None, true);
        catalog
    }

    fn analyze(catalog: &MemoryCatalog, stmt: &SelectStmt) -> Result<AnalyzedQuery, AnalyzerError> {
        QueryAnalyzer::analyze(stmt, catalog, AnalyzerConfig::default())
    }

    fn select(exprs: Vec<RawExpr>, from: Vec<FromItem>) -> SelectStmt {
        SelectStmt::select_exprs(exprs).from(from)
    }

    fn selected(query: &AnalyzedQuery, name: &str) -> Vec<i32> {
        query.entry_named(name).map(|e| e.selected_columns.iter().collect()).unwrap_or_default()
    }

    #[test]
    fn qualified_lookup_is_unique_per_name() {
        let catalog = seed_catalog();
        let query = analyze(&catalog, &select(vec![RawExpr::column("t2.a")], vec![FromItem::table("t1"), FromItem::table("t2")])).unwrap();
        let var = query.target_list[0].expression.as_column().unwrap();
        assert_eq!(var.reference.entity_slot, 2);

        // same relation name from two schemas: both entries answer to "t"
        let stmt = select(vec![RawExpr::column("t.a")], vec![FromItem::table("sales.t"), FromItem::table("archive.t")]);
        let err = analyze(&catalog, &stmt).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousReference);
        assert_eq!(err.message, "table reference \"t\" is ambiguous");

        let ok = select(vec![RawExpr::column("sales.t.a")], vec![FromItem::table("sales.t"), FromItem::table("archive.t")]);
        assert!(analyze(&catalog, &ok).is_ok());
    }

    #[test]
    fn dropped_columns_keep_their_positions() {
        let catalog = seed_catalog();
        let query = analyze(&catalog, &select(vec![RawExpr::star()], vec![FromItem::table("people")])).unwrap();
        assert_eq!(query.output_names(), vec!["id", "name"]);
        let positions: Vec<_> = query.target_list.iter().map(|c| c.expression.as_column().unwrap().reference.column_position).collect();
        assert_eq!(positions, vec![Some(ColumnPosition::User(1)), Some(ColumnPosition::User(3))]);
        assert_eq!(query.target_list[1].expression.typmod(), DataType::length_typmod(40));

        let people = query.entry_named("people").unwrap();
        let (names, _) = RelationExpander::expose_columns(people, true).unwrap();
        assert_eq!(names, vec!["id".to_string(), String::new(), "name".to_string()]);
    }

    #[test]
    fn star_follows_from_list_order() {
        let catalog = seed_catalog();
        let forward = analyze(&catalog, &select(vec![RawExpr::star()], vec![FromItem::table("t1"), FromItem::table("t2")])).unwrap();
        assert_eq!(forward.output_names(), vec!["a", "b", "a", "c"]);

        let mixed = select(
            vec![RawExpr::column("t2.c"), RawExpr::star(), RawExpr::column("t1.*")],
            vec![FromItem::table("t1"), FromItem::table("t2")],
        );
        let query = analyze(&catalog, &mixed).unwrap();
        assert_eq!(query.output_names(), vec!["c", "a", "b", "a", "c", "a", "b"]);
        assert_eq!(query.target_list.iter().map(|c| c.position).collect::<Vec<_>>(), (1..=7).collect::<Vec<u32>>());
    }

    #[test]
    fn provenance_crosses_subqueries() {
        let catalog = seed_catalog();
        let inner = select(vec![RawExpr::column("x.a")], vec![FromItem::table("x")]);
        let query = analyze(&catalog, &select(vec![RawExpr::column("a")], vec![FromItem::subquery(inner, "s")])).unwrap();
        let x = catalog.lookup_relation(&QualifiedName::from("x")).unwrap();
        assert_eq!(query.target_list[0].origin, Some(ColumnOrigin { relation: x, column: 1 }));

        let described = query.target_list[0].describe();
        assert_eq!(described.name, "a");
        assert_eq!(described.data_type, DataType::Integer);
    }

    #[test]
    fn provenance_crosses_joins_and_ctes() {
        let catalog = seed_catalog();
        let t1 = catalog.lookup_relation(&QualifiedName::from("t1")).unwrap();
        let t2 = catalog.lookup_relation(&QualifiedName::from("t2")).unwrap();

        let on = FromItem::join(JoinType::Inner, FromItem::table("t1"), FromItem::table("t2"), JoinQuals::On(RawExpr::boolean(true)));
        let query = analyze(&catalog, &select(vec![RawExpr::column("c"), RawExpr::column("b")], vec![on])).unwrap();
        assert_eq!(query.target_list[0].origin, Some(ColumnOrigin { relation: t2, column: 2 }));
        assert_eq!(query.target_list[1].origin, Some(ColumnOrigin { relation: t1, column: 2 }));

        let using = FromItem::join(JoinType::Inner, FromItem::table("t1"), FromItem::table("t2"), JoinQuals::Using(vec!["a".into()]));
        let query = analyze(&catalog, &select(vec![RawExpr::column("a")], vec![using])).unwrap();
        assert_eq!(query.target_list[0].origin, Some(ColumnOrigin { relation: t1, column: 1 }));

        let stmt = select(vec![RawExpr::column("b")], vec![FromItem::table("w")])
            .with_ctes(false, vec![CommonTableExpr::new("w", select(vec![RawExpr::column("b")], vec![FromItem::table("t1")]))]);
        let query = analyze(&catalog, &stmt).unwrap();
        assert_eq!(query.target_list[0].origin, Some(ColumnOrigin { relation: t1, column: 2 }));
    }

    #[test]
    fn unqualified_column_in_two_tables_is_ambiguous() {
        let catalog = seed_catalog();
        let err = analyze(&catalog, &select(vec![RawExpr::column("a")], vec![FromItem::table("t1"), FromItem::table("t2")])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousReference);
        assert_eq!(err.message, "column reference \"a\" is ambiguous");
    }

    #[test]
    fn lateral_references_to_earlier_items() {
        let catalog = seed_catalog();
        let inner = || SelectStmt::select_exprs(vec![RawExpr::column("t1.a")]);

        let ok = select(vec![RawExpr::column("s.a")], vec![FromItem::table("t1"), FromItem::lateral_subquery(inner(), "s")]);
        let query = analyze(&catalog, &ok).unwrap();
        assert!(query.entry_named("s").unwrap().lateral);

        let not_lateral = select(vec![RawExpr::column("s.a")], vec![FromItem::table("t1"), FromItem::subquery(inner(), "s")]);
        let err = analyze(&catalog, &not_lateral).unwrap_err();
        assert_eq!(err.message, "invalid reference to FROM-clause entry for table \"t1\"");
        assert_eq!(err.hint.as_deref(), Some("There is an entry for table \"t1\", but it cannot be referenced from this part of the query."));

        let right = FromItem::join(JoinType::Right, FromItem::table("t1"), FromItem::lateral_subquery(inner(), "s"), JoinQuals::On(RawExpr::boolean(true)));
        let err = analyze(&catalog, &select(vec![RawExpr::star()], vec![right])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidLateralReference);
        assert_eq!(err.detail.as_deref(), Some("The combining JOIN type must be INNER or LEFT for a LATERAL reference."));

        let left = FromItem::join(JoinType::Left, FromItem::table("t1"), FromItem::lateral_subquery(inner(), "s"), JoinQuals::On(RawExpr::boolean(true)));
        assert!(analyze(&catalog, &select(vec![RawExpr::star()], vec![left])).is_ok());
    }

    #[test]
    fn unaliased_items_are_named_by_their_shape() {
        let catalog = seed_catalog();
        let stmt = select(
            vec![
                RawExpr::coalesce(vec![RawExpr::column("a"), RawExpr::int(0)]),
                RawExpr::column("t1.a"),
                RawExpr::cast(RawExpr::int(1), TypeName::new("int")),
                RawExpr::call("lower", vec![RawExpr::column("b")]),
                RawExpr::binary("+", RawExpr::column("a"), RawExpr::int(1)),
            ],
            vec![FromItem::table("t1")],
        );
        let query = analyze(&catalog, &stmt).unwrap();
        assert_eq!(query.output_names(), vec!["coalesce", "a", "int", "lower", "?column?"]);
    }

    #[test]
    fn record_star_walks_two_subqueries() {
        let catalog = seed_catalog();
        let innermost = select(vec![RawExpr::column("a"), RawExpr::column("b")], vec![FromItem::table("t1")]);
        let middle = SelectStmt::select(vec![ResTarget::aliased(RawExpr::column("s"), "r")]).from(vec![FromItem::subquery(innermost, "s")]);
        let stmt = select(vec![RawExpr::field_star(RawExpr::column("q.r"))], vec![FromItem::subquery(middle, "q")]);

        let query = analyze(&catalog, &stmt).unwrap();
        assert_eq!(query.output_names(), vec!["a", "b"]);
        match &query.target_list[1].expression {
            TypedExpr::FieldSelect { field_number, ty, .. } => {
                assert_eq!(*field_number, 2);
                assert_eq!(*ty, DataType::Text);
            }
            other => panic!("expected field selection, got {other:?}"),
        }

        let one_field = select(vec![RawExpr::field(RawExpr::column("q.r"), "b")], vec![FromItem::subquery(
            SelectStmt::select(vec![ResTarget::aliased(RawExpr::column("s"), "r")])
                .from(vec![FromItem::subquery(select(vec![RawExpr::column("b")], vec![FromItem::table("t1")]), "s")]),
            "q",
        )]);
        let query = analyze(&catalog, &one_field).unwrap();
        assert_eq!(query.output_names(), vec!["b"]);
    }

    #[test]
    fn record_star_through_join_and_cte_columns() {
        let catalog = seed_catalog();
        let row_of_t1 = || {
            SelectStmt::select(vec![ResTarget::aliased(RawExpr::column("s"), "r")])
                .from(vec![FromItem::subquery(select(vec![RawExpr::column("a"), RawExpr::column("b")], vec![FromItem::table("t1")]), "s")])
        };

        let joined = FromItem::join(JoinType::Inner, FromItem::subquery(row_of_t1(), "q"), FromItem::table("t2"), JoinQuals::On(RawExpr::boolean(true)));
        let query = analyze(&catalog, &select(vec![RawExpr::field_star(RawExpr::column("r"))], vec![joined])).unwrap();
        assert_eq!(query.output_names(), vec!["a", "b"]);

        let from_cte = select(vec![RawExpr::field_star(RawExpr::column("w.r"))], vec![FromItem::table("w")])
            .with_ctes(false, vec![CommonTableExpr::new("w", row_of_t1())]);
        let query = analyze(&catalog, &from_cte).unwrap();
        assert_eq!(query.output_names(), vec!["a", "b"]);

        // the CTE is referenced one level below its definition
        let nested = select(vec![RawExpr::field_star(RawExpr::column("q.r"))], vec![FromItem::subquery(
            select(vec![RawExpr::column("r")], vec![FromItem::table("w")]),
            "q",
        )])
        .with_ctes(false, vec![CommonTableExpr::new("w", row_of_t1())]);
        let query = analyze(&catalog, &nested).unwrap();
        assert_eq!(query.output_names(), vec!["a", "b"]);
        assert_eq!(query.target_list[1].expression.data_type(), DataType::Text);
    }

    #[test]
    fn bare_star_needs_a_from_clause() {
        let catalog = seed_catalog();
        let err = analyze(&catalog, &SelectStmt::select_exprs(vec![RawExpr::star()])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyWildcardTarget);
    }

    #[test]
    fn join_reads_reach_the_legs() {
        let catalog = seed_catalog();
        let using = || FromItem::join(JoinType::Inner, FromItem::table("t1"), FromItem::table("t2"), JoinQuals::Using(vec!["a".into()]));

        let query = analyze(&catalog, &select(vec![RawExpr::star()], vec![using()])).unwrap();
        assert_eq!(query.output_names(), vec!["a", "b", "c"]);

        let query = analyze(&catalog, &select(vec![RawExpr::column("b")], vec![using()])).unwrap();
        assert_eq!(selected(&query, "t1"), vec![1, 2]);
        assert_eq!(selected(&query, "t2"), vec![1]);

        let aliased = FromItem::join_as(JoinType::Inner, FromItem::table("t1"), FromItem::table("t2"), JoinQuals::Using(vec!["a".into()]), Alias::new("j"));
        let query = analyze(&catalog, &select(vec![RawExpr::column("j")], vec![aliased])).unwrap();
        assert_eq!(selected(&query, "t1"), vec![1, 2]);
        assert_eq!(selected(&query, "t2"), vec![1, 2]);
        assert!(query.entry_named("t2").unwrap().requires_read);
    }

    #[test]
    fn outer_references_mark_the_outer_level() {
        let catalog = seed_catalog();
        let correlated = select(vec![RawExpr::int(1)], vec![FromItem::table("t2")])
            .filter(RawExpr::binary("=", RawExpr::column("t2.a"), RawExpr::column("t1.b")));
        let stmt = select(vec![RawExpr::column("a")], vec![FromItem::table("t1")]).filter(RawExpr::exists(correlated));

        let query = analyze(&catalog, &stmt).unwrap();
        assert_eq!(selected(&query, "t1"), vec![1, 2]);
        let Some(TypedExpr::SubLink { query: inner, .. }) = &query.criteria else { panic!("expected EXISTS") };
        assert_eq!(selected(inner, "t2"), vec![1]);
    }

    #[test]
    fn recursive_with_clause() {
        let catalog = seed_catalog();
        let body = |step: RawExpr| {
            SelectStmt::set_operation(
                SetOperator::Union,
                true,
                SelectStmt::select_exprs(vec![RawExpr::int(1)]),
                select(vec![step], vec![FromItem::table("walk")]).filter(RawExpr::binary("<", RawExpr::column("n"), RawExpr::int(5))),
            )
        };
        let walk = |step: RawExpr| CommonTableExpr::new("walk", body(step)).with_columns(&["n"]);

        let stmt = select(vec![RawExpr::column("n")], vec![FromItem::table("walk")])
            .with_ctes(true, vec![walk(RawExpr::binary("+", RawExpr::column("n"), RawExpr::int(1)))]);
        let query = analyze(&catalog, &stmt).unwrap();
        assert_eq!(query.output_names(), vec!["n"]);
        assert_eq!(query.target_list[0].expression.data_type(), DataType::Integer);
        assert_eq!(query.target_list[0].origin, None);
        assert_eq!(query.ctes.len(), 1);

        let widening = select(vec![RawExpr::column("n")], vec![FromItem::table("walk")])
            .with_ctes(true, vec![walk(RawExpr::binary("+", RawExpr::column("n"), RawExpr::int(5_000_000_000)))]);
        let err = analyze(&catalog, &widening).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DatatypeMismatch);
        assert_eq!(err.message, "recursive query \"walk\" column 1 has type integer in non-recursive term but type bigint overall");
    }

    #[test]
    fn set_operation_with_order_by() {
        let catalog = seed_catalog();
        let stmt = SelectStmt::set_operation(
            SetOperator::Union,
            false,
            select(vec![RawExpr::column("a")], vec![FromItem::table("t1")]),
            select(vec![RawExpr::column("a")], vec![FromItem::table("t2")]),
        )
        .order_by(RawExpr::column("a"), true);

        let query = analyze(&catalog, &stmt).unwrap();
        assert_eq!(query.sort_clause, vec![SortKey { position: 1, descending: true }]);
        assert_eq!(query.range_entries.iter().map(|e| e.display_name.as_str()).collect::<Vec<_>>(), vec!["*SELECT* 1", "*SELECT* 2"]);
    }

    #[rstest]
    #[case(HintMode::Enabled, "invalid reference to FROM-clause entry for table \"t1\"")]
    #[case(HintMode::Disabled, "missing FROM-clause entry for table \"t1\"")]
    fn hint_mode_changes_missing_table_errors(#[case] hints: HintMode, #[case] message: &str) {
        let catalog = seed_catalog();
        let stmt = select(vec![RawExpr::column("t1.a")], vec![FromItem::aliased_table("t1", Alias::new("x"))]);
        let err = QueryAnalyzer::analyze(&stmt, &catalog, AnalyzerConfig::default().with_hints(hints)).unwrap_err();
        assert_eq!(err.message, message);
    }

    #[test]
    fn functions_and_values_in_from() {
        let catalog = seed_catalog();
        let series = FromItem::function("generate_series", vec![RawExpr::int(1), RawExpr::int(3)], Some(Alias::new("g")));
        let query = analyze(&catalog, &select(vec![RawExpr::star()], vec![series])).unwrap();
        assert_eq!(query.output_names(), vec!["g"]);

        let rows = vec![vec![RawExpr::int(1), RawExpr::string("a")], vec![RawExpr::int(2), RawExpr::string("b")]];
        let values = FromItem::values(rows, Some(Alias::with_columns("v", &["id", "label"])));
        let query = analyze(&catalog, &select(vec![RawExpr::star()], vec![values])).unwrap();
        assert_eq!(query.output_names(), vec!["id", "label"]);
    }

    #[test]
    fn config_loaded_from_json_reaches_the_analyzer() {
        let catalog = seed_catalog();
        let config = AnalyzerConfig::from_json_str(r#"{ "max_name_parts": 2 }"#).unwrap();
        let stmt = select(vec![RawExpr::column("public.t1.a")], vec![FromItem::table("t1")]);
        let err = QueryAnalyzer::analyze(&stmt, &catalog, config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::QualifiedNameTooLong);
    }

    #[test]
    fn shared_catalog_serves_parallel_analyses() {
        let shared = seed_catalog().into_shared();
        let stmt = select(vec![RawExpr::star()], vec![FromItem::table("t1")]);
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| QueryAnalyzer::analyze(&stmt, &shared, AnalyzerConfig::default()).map(|q| q.output_names())))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap().unwrap(), vec!["a", "b"]);
            }
        });
    }
}
