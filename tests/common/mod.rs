#![allow(dead_code)]

//! Scripted in-process driver for exercising the dispatcher without a server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sql_dispatch::prelude::*;

pub const FAKE_CONNECTION_STRING: &str = "Server=fake;Database=test";

/// One result set the fake reader will yield.
#[derive(Debug, Clone, Default)]
pub struct FakeResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl FakeResultSet {
    pub fn new(columns: &[(&str, &str)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, type_name)| ColumnMeta::new(*name, *type_name))
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(values);
        self
    }
}

/// What every connection opened by a [`FakeConnector`] does.
#[derive(Debug, Clone)]
pub enum Script {
    ResultSets(Vec<FakeResultSet>),
    RowsAffected(u64),
    ConnectFails(String),
    /// Serve `sets`, then fail once `after_rows` rows have been read.
    RowFails {
        sets: Vec<FakeResultSet>,
        after_rows: usize,
        message: String,
    },
}

#[derive(Debug, Default)]
pub struct Stats {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub released: AtomicUsize,
    pub commands: Mutex<Vec<Command>>,
    pub connection_strings: Mutex<Vec<String>>,
}

impl Stats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn last_command(&self) -> Command {
        self.commands
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no command was executed")
    }

    pub fn connection_strings(&self) -> Vec<String> {
        self.connection_strings.lock().unwrap().clone()
    }

    fn record(&self, command: &Command) {
        self.commands.lock().unwrap().push(command.clone());
    }
}

pub struct FakeConnector {
    script: Script,
    pub stats: Arc<Stats>,
}

impl FakeConnector {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            stats: Arc::new(Stats::default()),
        })
    }

    pub fn rows(sets: Vec<FakeResultSet>) -> Arc<Self> {
        Self::new(Script::ResultSets(sets))
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn Connection>, SqlDispatchError> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        self.stats
            .connection_strings
            .lock()
            .unwrap()
            .push(connection_string.to_string());
        if let Script::ConnectFails(message) = &self.script {
            return Err(SqlDispatchError::ConnectionError(message.clone()));
        }
        Ok(Box::new(FakeConnection {
            script: self.script.clone(),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct FakeConnection {
    script: Script,
    stats: Arc<Stats>,
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn execute_non_query(&mut self, command: &Command) -> Result<u64, SqlDispatchError> {
        self.stats.record(command);
        match &self.script {
            Script::RowsAffected(count) => Ok(*count),
            other => Err(SqlDispatchError::ExecutionError(format!(
                "non-query not scripted: {other:?}"
            ))),
        }
    }

    async fn execute_reader<'a>(
        &'a mut self,
        command: &'a Command,
    ) -> Result<Box<dyn DataReader + 'a>, SqlDispatchError> {
        self.stats.record(command);
        match &self.script {
            Script::ResultSets(sets) => Ok(Box::new(FakeReader::new(sets.clone(), None))),
            Script::RowFails {
                sets,
                after_rows,
                message,
            } => Ok(Box::new(FakeReader::new(
                sets.clone(),
                Some((*after_rows, message.clone())),
            ))),
            other => Err(SqlDispatchError::ExecutionError(format!(
                "reader not scripted: {other:?}"
            ))),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), SqlDispatchError> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeReader {
    sets: VecDeque<FakeResultSet>,
    current: VecDeque<Vec<SqlValue>>,
    rows_served: usize,
    fail: Option<(usize, String)>,
}

impl FakeReader {
    pub fn new(sets: Vec<FakeResultSet>, fail: Option<(usize, String)>) -> Self {
        Self {
            sets: sets.into(),
            current: VecDeque::new(),
            rows_served: 0,
            fail,
        }
    }
}

#[async_trait]
impl DataReader for FakeReader {
    async fn next_result(&mut self) -> Result<Option<Vec<ColumnMeta>>, SqlDispatchError> {
        Ok(self.sets.pop_front().map(|set| {
            self.current = set.rows.into();
            set.columns
        }))
    }

    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, SqlDispatchError> {
        if let Some((after_rows, message)) = &self.fail {
            if self.rows_served == *after_rows {
                return Err(SqlDispatchError::ExecutionError(message.clone()));
            }
        }
        let row = self.current.pop_front();
        if row.is_some() {
            self.rows_served += 1;
        }
        Ok(row)
    }
}

/// Dispatcher over `connector` with the fake default connection string.
pub fn dispatcher(connector: &Arc<FakeConnector>) -> Dispatcher {
    Dispatcher::new(
        Arc::clone(connector) as Arc<dyn Connector>,
        Some(FAKE_CONNECTION_STRING.to_string()),
    )
}

pub fn params<const N: usize>(entries: [(&str, Value); N]) -> ParameterMap {
    entries.into_iter().collect()
}
