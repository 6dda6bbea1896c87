// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use crate::aggcore_config::config as aggcore_app_config;

pub(crate) fn aggregation_worker_threads() -> usize {
    aggcore_app_config()
        .ok()
        .map(|c| c.runtime.actual_aggregation_worker_threads())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
}

pub(crate) fn group_by_initial_capacity() -> usize {
    aggcore_app_config()
        .ok()
        .map(|c| c.runtime.group_by_initial_capacity)
        .unwrap_or(1024)
}

pub(crate) fn tree_merge_enabled() -> bool {
    aggcore_app_config()
        .ok()
        .map(|c| c.runtime.tree_merge)
        .unwrap_or(true)
}
